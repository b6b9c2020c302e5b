//! Design loading boundary
//!
//! A *design* is a serialized component subtree loaded onto a surface from
//! a URL. Deserialization itself lives behind the [`DesignLoader`] seam;
//! this module owns only the loaded tree, named lookup, and the error
//! policy around a load attempt. Unloading drops the [`DesignRoot`], which
//! transitively releases the whole subtree; individual components are never
//! freed piecemeal.

use thiserror::Error;

/// Design loading and lookup errors
#[derive(Error, Debug)]
pub enum DesignError {
    /// The loader failed to produce a component tree
    #[error("Failed to load design from {url}: {reason}")]
    LoadFailed {
        /// Source URL of the design
        url: String,
        /// Loader-reported failure reason
        reason: String,
    },

    /// A required named component is missing from the loaded design
    #[error("Component not found: {name}")]
    ComponentNotFound {
        /// The name that was looked up
        name: String,
    },

    /// A design load was requested but no loader is configured
    #[error("No design loader configured")]
    NoLoader,
}

/// Error policy applied to a design load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Re-raise load errors to the caller (standalone/runtime mode)
    #[default]
    Strict,
    /// Log a warning and abandon the load, leaving no design loaded
    /// (embedding/design-time mode)
    WarnAndSkip,
}

/// One node of a loaded design subtree
#[derive(Debug, Clone)]
pub struct DesignComponent {
    name: String,
    children: Vec<DesignComponent>,
}

impl DesignComponent {
    /// Create a leaf component
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Create a component with children
    pub fn with_children(name: impl Into<String>, children: Vec<DesignComponent>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// Component name, unique within a design by loader contract
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Child components
    pub fn children(&self) -> &[DesignComponent] {
        &self.children
    }

    /// Depth-first lookup by name, including this component itself
    pub fn find(&self, name: &str) -> Option<&DesignComponent> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// Owner scope of a loaded design
///
/// Holds the component tree and its source URL. Dropping the root disposes
/// the scope and releases the subtree.
#[derive(Debug)]
pub struct DesignRoot {
    url: String,
    root: DesignComponent,
}

impl DesignRoot {
    /// Wrap a loaded component tree with its source URL
    pub fn new(url: impl Into<String>, root: DesignComponent) -> Self {
        Self {
            url: url.into(),
            root,
        }
    }

    /// URL the design was loaded from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Root component of the subtree
    pub fn root(&self) -> &DesignComponent {
        &self.root
    }

    /// Depth-first lookup by name anywhere in the subtree
    pub fn find(&self, name: &str) -> Option<&DesignComponent> {
        self.root.find(name)
    }
}

/// External serialization collaborator that materializes a design from a URL
pub trait DesignLoader {
    /// Load the component tree identified by `url`
    fn load(&mut self, url: &str) -> Result<DesignRoot, DesignError>;
}
