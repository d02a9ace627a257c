//! Diagnostic summaries and detail templates shared by every component.
//!
//! Summaries are title case, never end with a period, and never carry
//! placeholders: they are what callers match on. Details are sentence case
//! and carry the identifying context (resource type, identifiers, the
//! underlying error text).

pub const SUMMARY_VALUE_CONVERSION: &str = "Value Conversion Error";
pub const SUMMARY_INVALID_TIMEOUT: &str = "Invalid Timeout Value";
pub const SUMMARY_UNCONFIGURED_CLIENT: &str = "Unconfigured Client";
pub const SUMMARY_CONTEXT_DONE: &str = "Operation Interrupted";

pub const SUMMARY_ERROR_CREATING_RESOURCE: &str = "Error Creating Resource";
pub const SUMMARY_ERROR_READING_RESOURCE: &str = "Error Reading Resource";
pub const SUMMARY_ERROR_UPDATING_RESOURCE: &str = "Error Updating Resource";
pub const SUMMARY_ERROR_DELETING_RESOURCE: &str = "Error Deleting Resource";
pub const SUMMARY_ERROR_READING_DATA_SOURCE: &str = "Error Reading Data Source";
pub const SUMMARY_UNEXPECTED_IDENTIFIER: &str = "Unexpected Read Identifier";

pub const SUMMARY_BETA_RESOURCE: &str = "Beta Resource Not Enabled";
pub const SUMMARY_BETA_DATA_SOURCE: &str = "Beta DataSource Not Enabled";

/// Raised by remote-state classifiers when an object reached a state it
/// cannot leave on its own. The lifecycle adapter keys create rollback on it.
pub const SUMMARY_TERMINAL_STATE: &str = "Remote Object In Terminal State";
pub const SUMMARY_PENDING_ACTION: &str = "Remote Object Requires Action";
pub const SUMMARY_CONVERGENCE_TIMEOUT: &str = "Timeout Waiting For Remote State";
pub const SUMMARY_RESOURCE_CONFLICT: &str = "Resource Conflict";
pub const SUMMARY_ROLLBACK_FAILED: &str = "Error Rolling Back Resource";

pub fn detail_value_conversion(what: &str, err: impl std::fmt::Display) -> String {
    format!("Unable to decode the {what} record: {err}.")
}

pub fn detail_invalid_timeout(key: &str, err: impl std::fmt::Display) -> String {
    format!("Failed to parse timeout value for {key:?}: {err}")
}

fn detail_error(verb: &str, type_name: &str, id: &str, err: impl std::fmt::Display) -> String {
    if id.is_empty() {
        format!("An error occurred while {verb} `{type_name}`: {err}")
    } else {
        format!("An error occurred while {verb} `{type_name}` {id:?}: {err}")
    }
}

pub fn detail_error_creating(type_name: &str, id: &str, err: impl std::fmt::Display) -> String {
    detail_error("creating", type_name, id, err)
}

pub fn detail_error_reading(type_name: &str, id: &str, err: impl std::fmt::Display) -> String {
    detail_error("reading", type_name, id, err)
}

pub fn detail_error_updating(type_name: &str, id: &str, err: impl std::fmt::Display) -> String {
    detail_error("updating", type_name, id, err)
}

pub fn detail_error_deleting(type_name: &str, id: &str, err: impl std::fmt::Display) -> String {
    detail_error("deleting", type_name, id, err)
}

pub fn detail_context_done(operation: &str, type_name: &str, id: &str, err: impl std::fmt::Display) -> String {
    if id.is_empty() {
        format!("The {operation} of `{type_name}` did not finish: {err}.")
    } else {
        format!("The {operation} of `{type_name}` {id:?} did not finish: {err}.")
    }
}

pub fn detail_unexpected_identifier(template: &str, got: &str) -> String {
    format!("Expected import identifier with format: {template:?}. Got: {got:?}")
}

pub fn detail_termination_protected(type_name: &str) -> String {
    format!("The resource `{type_name}` has termination protection enabled and cannot be deleted.")
}

pub fn detail_beta_resource(type_name: &str, switch: &str) -> String {
    format!(
        "The `{type_name}` resource is in beta. Set `enable_beta` in the provider configuration \
         or the `{switch}` environment variable to enable."
    )
}

pub fn detail_beta_data_source(type_name: &str, switch: &str) -> String {
    format!(
        "The `{type_name}` data source is in beta. Set `enable_beta` in the provider configuration \
         or the `{switch}` environment variable to enable."
    )
}

pub fn detail_unconfigured_client(type_name: &str) -> String {
    format!("The `{type_name}` resource was invoked before the provider configured its client.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_names_type_and_identifier() {
        let detail = detail_error_creating("provix_project_vpc", "p/vpc-1", "[409]: already exists");
        assert_eq!(
            detail,
            "An error occurred while creating `provix_project_vpc` \"p/vpc-1\": [409]: already exists"
        );
        assert_eq!(
            detail_error_reading("provix_project_vpc", "", "boom"),
            "An error occurred while reading `provix_project_vpc`: boom"
        );
    }

    #[test]
    fn test_beta_detail_names_both_switches() {
        let detail = detail_beta_resource("provix_thing", "PROVIX_ENABLE_BETA");
        assert!(detail.contains("enable_beta"));
        assert!(detail.contains("PROVIX_ENABLE_BETA"));
    }
}
