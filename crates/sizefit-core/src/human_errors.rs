// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to one plain-language message with a clear
// suggestion. The severity drives how a frontend presents it.

use crate::error::SizefitError;
use crate::types::RemotePhase;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Network blip, timeout — trying again may work.
    Transient,
    /// User must do something (fix the budget, the credential, the file).
    ActionRequired,
    /// Cannot be fixed by retrying or by changing settings.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying the same request again can succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `SizefitError` into a `HumanError`.
pub fn humanize_error(err: &SizefitError) -> HumanError {
    match err {
        SizefitError::ImageDecode { resource, .. } => HumanError {
            message: "One of the images in this PDF could not be read.".into(),
            suggestion: format!(
                "The image ({resource}) was left as it is. If the file is still too large, try re-exporting the PDF from its original program."
            ),
            retriable: false,
            severity: Severity::Permanent,
        },

        SizefitError::Pdf(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged or encrypted. Try opening it in a PDF viewer and saving a fresh copy.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        SizefitError::Serialization(_) => HumanError {
            message: "The compressed PDF could not be written.".into(),
            suggestion: "Nothing was saved. Try again with a different quality setting, or report the file if it keeps happening.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        SizefitError::OversizedPage { page, size, budget } => HumanError {
            message: format!("Page {} is too large to fit on its own.", page + 1),
            suggestion: format!(
                "That page needs {size} bytes but the limit is {budget}. Try a lower DPI or quality, or allow oversized pages."
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        SizefitError::Configuration(detail) => HumanError {
            message: "The settings are not valid.".into(),
            suggestion: format!("Check the size limit, DPI and quality values. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        SizefitError::Backend { phase, .. } => humanize_backend_error(*phase),

        SizefitError::Worker(_) => HumanError {
            message: "The compression job stopped unexpectedly.".into(),
            suggestion: "Nothing was saved. Please try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        SizefitError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "The file couldn't be found.".into(),
                suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "The file or folder can't be accessed.".into(),
                suggestion: "Check that you have permission to read the file and write to the output folder.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or saving a file.".into(),
                suggestion: "Make sure the disk isn't full, then try again.".into(),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        SizefitError::Json(_) => HumanError {
            message: "The settings file could not be read.".into(),
            suggestion: "The configuration file is not valid JSON. Fix or remove it and try again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

fn humanize_backend_error(phase: RemotePhase) -> HumanError {
    match phase {
        RemotePhase::Authenticate => HumanError {
            message: "The compression service did not accept our credentials.".into(),
            suggestion: "Check the service key in the settings, or switch to local compression.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
        RemotePhase::Start => HumanError {
            message: "The compression service could not start a job.".into(),
            suggestion: "The service may be busy or out of credits. Try again later, or switch to local compression.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
        RemotePhase::Upload | RemotePhase::Process | RemotePhase::Download => HumanError {
            message: format!("The compression service failed during {phase}."),
            suggestion: "Check your internet connection and try again. No partial file was kept.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceId;

    #[test]
    fn oversized_page_uses_one_based_numbering() {
        let err = SizefitError::OversizedPage {
            page: 4,
            size: 900,
            budget: 500,
        };
        let human = humanize_error(&err);
        assert!(human.message.contains("Page 5"));
        assert_eq!(human.severity, Severity::ActionRequired);
    }

    #[test]
    fn auth_failure_is_not_retriable() {
        let human = humanize_error(&SizefitError::backend(RemotePhase::Authenticate, "401"));
        assert!(!human.retriable);
    }

    #[test]
    fn download_failure_is_transient() {
        let human = humanize_error(&SizefitError::backend(RemotePhase::Download, "timed out"));
        assert!(human.retriable);
        assert!(human.message.contains("download"));
    }

    #[test]
    fn image_decode_names_the_resource() {
        let err = SizefitError::ImageDecode {
            resource: ResourceId::new(12, 0),
            reason: "bad huffman table".into(),
        };
        assert!(humanize_error(&err).suggestion.contains("12 0 R"));
    }

    #[test]
    fn missing_file_needs_user_action() {
        let err = SizefitError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }
}
