use uuid::Uuid;

pub mod competition;

// Re-exports for convenience
pub use competition::*;

// Helper function to generate record ids in the format expected by the database
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id1 = generate_id();
        let id2 = generate_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32); // UUID simple format is 32 chars
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
