use super::*;

use crate::{render_bail, render_err};

// ============================================================================
// Display formatting
// ============================================================================

#[test]
fn test_display_messages() {
    assert_eq!(
        Error::BackendError("boom".to_string()).to_string(),
        "Backend error: boom"
    );
    assert_eq!(Error::OutOfMemory.to_string(), "Out of GPU memory");
    assert_eq!(
        Error::InvalidResource("bad".to_string()).to_string(),
        "Invalid resource: bad"
    );
    assert_eq!(
        Error::CapacityExhausted("nodes".to_string()).to_string(),
        "Capacity exhausted: nodes"
    );
    assert_eq!(
        Error::InitializationFailed("no device".to_string()).to_string(),
        "Initialization failed: no device"
    );
}

#[test]
fn test_error_implements_std_error() {
    let error: Box<dyn std::error::Error> = Box::new(Error::OutOfMemory);
    assert!(!error.to_string().is_empty());
}

#[test]
fn test_errors_are_cloneable() {
    let error = Error::BackendError("x".to_string());
    let clone = error.clone();
    assert_eq!(error.to_string(), clone.to_string());
}

// ============================================================================
// Macros
// ============================================================================

#[test]
fn test_render_err_builds_backend_error() {
    let error = render_err!("orrery3d::test", "value {} out of range", 42);
    match error {
        Error::BackendError(message) => assert_eq!(message, "value 42 out of range"),
        other => panic!("unexpected variant: {:?}", other),
    }
}

#[test]
fn test_render_bail_returns_early() {
    fn failing() -> Result<u32> {
        render_bail!("orrery3d::test", "nope");
        #[allow(unreachable_code)]
        Ok(1)
    }

    let result = failing();
    assert!(matches!(result, Err(Error::BackendError(_))));
}

#[test]
fn test_render_bail_formats_arguments() {
    fn failing(limit: usize) -> Result<()> {
        if limit < 10 {
            render_bail!("orrery3d::test", "limit {} below minimum {}", limit, 10);
        }
        Ok(())
    }

    assert!(failing(20).is_ok());
    match failing(3) {
        Err(Error::BackendError(message)) => {
            assert_eq!(message, "limit 3 below minimum 10");
        }
        other => panic!("unexpected: {:?}", other),
    }
}
