//! Database blocks: connection env var plus migration settings.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the environment variable carrying the connection
    /// string. The value itself never appears in the config file.
    pub connection_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Registered migration engine id.
    pub engine: String,
    /// Directory of migration files, relative to the project root.
    pub directory: String,
    #[serde(default = "default_true")]
    pub pre_deploy: bool,
    #[serde(default)]
    pub post_deploy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_defaults() {
        let yaml = r#"
connection_env: DATABASE_URL
migration:
  engine: sql
  directory: migrations
"#;
        let db: DatabaseConfig = serde_yaml::from_str(yaml).unwrap();
        let migration = db.migration.unwrap();
        assert!(migration.pre_deploy);
        assert!(!migration.post_deploy);
    }
}
