//! Name and label sanitization for cluster resources

use wharf_config::constants::MAX_GENERATED_NAME_PREFIX;

/// Label values are limited to 63 characters
const MAX_LABEL_VALUE: usize = 63;

/// Name prefix for the workload of one step
///
/// The result is lowercase, only contains `[a-z0-9-]`, neither starts nor
/// ends with `-`, and is at most [`MAX_GENERATED_NAME_PREFIX`] characters.
/// The orchestrator appends its own uniqueness suffix.
#[must_use]
pub fn generated_name(prefix: &str, step_type: &str, step_name: &str) -> String {
    let raw = format!("{prefix}-{step_type}-{step_name}");
    let sanitized: String = raw
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .take(MAX_GENERATED_NAME_PREFIX)
        .collect();
    sanitized.trim_matches('-').to_string()
}

/// Make an arbitrary string usable as a label value
///
/// Invalid characters become `-`, and the value is trimmed so that it
/// starts and ends with an alphanumeric character.
#[must_use]
pub fn sanitize_label_value(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_LABEL_VALUE)
        .collect();
    sanitized
        .trim_matches(|c: char| !c.is_ascii_alphanumeric())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_invalid_characters() {
        assert_eq!(
            generated_name("wharf-build", "container", "Run Unit_Tests"),
            "wharf-build-container-run-unit-tests"
        );
    }

    #[test]
    fn trims_dashes_left_by_truncation_or_input() {
        let name = generated_name("wharf-build", "helm-package", "--publish chart--");
        assert!(!name.ends_with('-'));
        assert!(!name.starts_with('-'));

        let name = generated_name("-wharf", "x", "y");
        assert_eq!(name, "wharf-x-y");
    }

    #[test]
    fn truncates_to_prefix_bound() {
        let long_step = "a".repeat(100);
        let name = generated_name("wharf-build", "nuget-package", &long_step);
        assert!(name.len() <= MAX_GENERATED_NAME_PREFIX);
        assert!(name.starts_with("wharf-build-nuget-package-aaa"));
    }

    #[test]
    fn non_ascii_is_replaced_per_character() {
        let name = generated_name("wharf-build", "container", "bygg-åäö");
        assert_eq!(name, "wharf-build-container-bygg");
    }

    #[test]
    fn label_values_start_and_end_alphanumeric() {
        assert_eq!(sanitize_label_value("my stage!"), "my-stage");
        assert_eq!(sanitize_label_value("_hidden_"), "hidden");
        assert_eq!(sanitize_label_value(&"x".repeat(80)).len(), 63);
    }
}
