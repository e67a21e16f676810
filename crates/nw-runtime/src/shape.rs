//! Statement-shape checks run before a statement is wired to a named window.
//!
//! The registry never inspects view composition; deployment calls these and
//! reports the fixed diagnostics carried by [`CoreReason`].

use nw_core::error::{CoreReason, CoreResult};
use orion_error::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    /// Retains events (length, time, keep-all, unique, ...).
    DataWindow,
    /// Derives values without retaining events (statistics, grouping, ...).
    Derived,
}

/// One view declared by a statement, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    pub name: String,
    pub kind: ViewKind,
}

impl ViewSpec {
    pub fn data_window(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ViewKind::DataWindow,
        }
    }

    pub fn derived(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ViewKind::Derived,
        }
    }
}

/// A `create window` statement must declare at least one data window.
pub fn check_create_window_views(views: &[ViewSpec]) -> CoreResult<()> {
    if views.iter().any(|v| v.kind == ViewKind::DataWindow) {
        return Ok(());
    }
    StructError::from(CoreReason::MissingDataWindow).err()
}

/// A statement consuming a named window may not declare a data window onto it.
pub fn check_consumer_views(window: &str, views: &[ViewSpec]) -> CoreResult<()> {
    match views.iter().find(|v| v.kind == ViewKind::DataWindow) {
        None => Ok(()),
        Some(v) => StructError::from(CoreReason::DisallowedDataWindow)
            .with_detail(format!("view {:?} declared onto named window {window:?}", v.name))
            .err(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nw_core::error::{ERROR_MSG_DATAWINDOWS, ERROR_MSG_NO_DATAWINDOW_ALLOWED};

    #[test]
    fn create_window_requires_data_window() {
        assert!(check_create_window_views(&[ViewSpec::data_window("length")]).is_ok());
        assert!(
            check_create_window_views(&[ViewSpec::derived("size"), ViewSpec::data_window("time")])
                .is_ok()
        );

        let err = check_create_window_views(&[ViewSpec::derived("size")]).unwrap_err();
        assert!(err.to_string().contains(ERROR_MSG_DATAWINDOWS), "{err}");
        assert!(check_create_window_views(&[]).is_err());
    }

    #[test]
    fn consumer_rejects_data_window() {
        assert!(check_consumer_views("Orders", &[]).is_ok());
        assert!(check_consumer_views("Orders", &[ViewSpec::derived("size")]).is_ok());

        let err = check_consumer_views("Orders", &[ViewSpec::data_window("length")]).unwrap_err();
        assert!(err.to_string().contains(ERROR_MSG_NO_DATAWINDOW_ALLOWED), "{err}");
    }
}
