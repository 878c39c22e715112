//! Integration tests for config

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;
    use wharf_config::*;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const OWNER_VARS: [&str; 4] = [
        "WHARF_OWNER_ENABLED",
        "WHARF_OWNER_NAME",
        "WHARF_OWNER_UID",
        "WHARF_NAMESPACE",
    ];

    fn clear_env() {
        for var in OWNER_VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[kubernetes]
namespace = "ci"

[workload]
init_image = "busybox:1.36"
repo_mount_path = "/work"

[owner]
enabled = true
name = "wharf-worker-0"
uid = "1234"

[run]
project_id = "42"
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.kubernetes.namespace, "ci");
        assert_eq!(config.workload.init_image, "busybox:1.36");
        assert_eq!(config.workload.repo_mount_path, "/work");
        assert_eq!(config.workload.name_prefix, "wharf-build");
        assert!(config.owner.is_active());
        assert_eq!(config.owner.kind, "Pod");
        assert_eq!(config.run.project_id.as_deref(), Some("42"));
        assert!(config.run.instance_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from_file(&dir.path().join("absent.toml")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("WHARF_NAMESPACE", "builds");
        std::env::set_var("WHARF_OWNER_ENABLED", "true");
        std::env::set_var("WHARF_OWNER_NAME", "wharf-worker-1");
        std::env::set_var("WHARF_OWNER_UID", "abcd");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(config.kubernetes.namespace, "builds");
        assert!(config.owner.is_active());
        assert_eq!(config.owner.name, "wharf-worker-1");

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("WHARF_OWNER_ENABLED", "sometimes");

        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        clear_env();
    }
}
