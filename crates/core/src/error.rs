//! Error types for the Voxelwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::collections::BTreeMap;

use thiserror::Error;

/// The top-level error type for all Voxelwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Schematic errors ---
    #[error("Schematic error: {0}")]
    Schematic(#[from] SchematicError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A schematic could not be produced for a build request.
#[derive(Debug, Clone, Error)]
pub enum SchematicError {
    #[error("No schematic format recognises '{0}'")]
    UnknownFormat(String),

    #[error("Failed to parse schematic '{name}': {reason}")]
    Parse { name: String, reason: String },

    #[error("Schematic extent {width}x{height}x{length} is not buildable")]
    InvalidExtent { width: i32, height: i32, length: i32 },
}

/// Failures that need an operator to step in.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("No build session is active")]
    NoActiveSession,

    #[error("Unable to make progress on layer {layer}; missing {}", describe_missing(.missing))]
    Stalled {
        layer: i32,
        missing: BTreeMap<String, usize>,
    },
}

fn describe_missing(missing: &BTreeMap<String, usize>) -> String {
    if missing.is_empty() {
        return "nothing (no reachable geometry)".into();
    }
    missing
        .iter()
        .map(|(block, count)| format!("{count}x {block}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schematic_error_displays_correctly() {
        let err = Error::Schematic(SchematicError::Parse {
            name: "castle.schem".into(),
            reason: "truncated palette".into(),
        });
        assert!(err.to_string().contains("castle.schem"));
        assert!(err.to_string().contains("truncated palette"));
    }

    #[test]
    fn stalled_error_lists_missing_materials() {
        let mut missing = BTreeMap::new();
        missing.insert("stone".to_string(), 3);
        missing.insert("oak_planks".to_string(), 1);
        let err = Error::Session(SessionError::Stalled { layer: 2, missing });
        let text = err.to_string();
        assert!(text.contains("layer 2"));
        assert!(text.contains("3x stone"));
        assert!(text.contains("1x oak_planks"));
    }

    #[test]
    fn stalled_error_without_missing_materials() {
        let err = SessionError::Stalled {
            layer: 0,
            missing: BTreeMap::new(),
        };
        assert!(err.to_string().contains("no reachable geometry"));
    }
}
