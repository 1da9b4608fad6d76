//! The `fedora_cloud_tests.test_results.v1.azure` message schema.
//!
//! Describes the results of one LISA run against one gallery image so they
//! can be announced on the bus. Nothing here parses LISA output; a body is
//! built or received as JSON and checked against the schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ResultsError;

/// Application name recorded on published results.
pub const RESULTS_APP_NAME: &str = "fedora_cloud_tests";

/// Base topic of every results message.
pub const RESULTS_BASE_TOPIC: &str = "fedora_cloud_tests.test_results.v1";

/// Tests in one outcome category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestResultGroup {
    /// Number of tests in this category.
    pub count: u64,
    /// Test name → explanation (pass timing, failure or skip reason).
    pub tests: BTreeMap<String, String>,
}

/// Body of an `AzureTestResults` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureTestResults {
    pub architecture: String,
    pub compose_id: String,
    pub image_id: String,
    pub image_resource_id: String,
    pub failed_tests: TestResultGroup,
    pub skipped_tests: TestResultGroup,
    pub passed_tests: TestResultGroup,
}

impl AzureTestResults {
    /// Topic the results are published under.
    pub fn topic() -> String {
        format!("{RESULTS_BASE_TOPIC}.azure")
    }

    /// Validates a JSON body against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError::Schema`] for missing fields or wrong types and
    /// [`ResultsError::EmptyField`] for empty identifying strings.
    pub fn from_value(body: Value) -> Result<Self, ResultsError> {
        let results: Self = serde_json::from_value(body)?;
        for (field, value) in [
            ("architecture", &results.architecture),
            ("compose_id", &results.compose_id),
            ("image_id", &results.image_id),
            ("image_resource_id", &results.image_resource_id),
        ] {
            if value.is_empty() {
                return Err(ResultsError::EmptyField { field });
            }
        }
        Ok(results)
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "Azure Cloud image {} tested successfully ({} tests passed, {} tests failed, {} tests skipped)",
            self.image_id, self.passed_tests.count, self.failed_tests.count, self.skipped_tests.count
        )
    }
}

impl std::fmt::Display for AzureTestResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AzureImageTestResults for {}", self.image_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "architecture": "x86_64",
            "compose_id": "Fedora-41-20241001.n.0",
            "image_id": "Fedora-Cloud-41-x64",
            "image_resource_id": "/subscriptions/test/resourceGroups/test/providers/Microsoft.Compute/galleries/test",
            "failed_tests": {"count": 0, "tests": {}},
            "skipped_tests": {"count": 0, "tests": {}},
            "passed_tests": {
                "count": 1,
                "tests": {"Provisioning.smoke_test": "Test passed in 46.198 seconds"}
            }
        })
    }

    #[test]
    fn topic_extends_base_topic() {
        assert_eq!(AzureTestResults::topic(), "fedora_cloud_tests.test_results.v1.azure");
    }

    #[test]
    fn valid_body_summarises() {
        let results = AzureTestResults::from_value(valid_body()).unwrap();
        assert_eq!(
            results.summary(),
            "Azure Cloud image Fedora-Cloud-41-x64 tested successfully (1 tests passed, 0 tests failed, 0 tests skipped)"
        );
        let shown = results.to_string();
        assert!(shown.contains("AzureImageTestResults"));
        assert!(shown.contains("Fedora-Cloud-41-x64"));
    }

    #[test]
    fn missing_required_fields_fail() {
        let err = AzureTestResults::from_value(json!({"architecture": "x86_64"})).unwrap_err();
        assert!(matches!(err, ResultsError::Schema(_)));
    }

    #[test]
    fn wrong_group_shape_fails() {
        let mut body = valid_body();
        body["passed_tests"] = json!("not_an_object");
        assert!(AzureTestResults::from_value(body).is_err());

        let mut body = valid_body();
        body["failed_tests"]["count"] = json!("not_a_number");
        assert!(AzureTestResults::from_value(body).is_err());

        let mut body = valid_body();
        body["skipped_tests"]["extra"] = json!(true);
        assert!(AzureTestResults::from_value(body).is_err());
    }

    #[test]
    fn empty_identifier_fails() {
        let mut body = valid_body();
        body["image_id"] = json!("");
        assert!(matches!(
            AzureTestResults::from_value(body),
            Err(ResultsError::EmptyField { field: "image_id" })
        ));
    }
}
