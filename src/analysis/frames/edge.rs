//! Control flow edge types between instruction positions.

/// The kind of control flow represented by an edge.
///
/// # Examples
///
/// ```rust
/// use boxelide::analysis::frames::EdgeKind;
///
/// assert!(EdgeKind::Branch.is_jump());
/// assert!(EdgeKind::Exception { catch_type: None }.is_exceptional());
/// assert!(!EdgeKind::Fallthrough.is_exceptional());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeKind {
    /// Execution continues with the next instruction in order.
    ///
    /// This includes the not-taken side of a conditional branch.
    Fallthrough,

    /// A taken branch, conditional or not.
    Branch,

    /// Edge from an instruction inside a protected region to its handler.
    ///
    /// The handler is entered with an empty operand stack apart from the caught
    /// exception reference.
    Exception {
        /// The class caught by the handler, `None` for a catch-all handler.
        catch_type: Option<String>,
    },
}

impl EdgeKind {
    /// Returns `true` for [`Branch`](Self::Branch) edges.
    #[must_use]
    pub const fn is_jump(&self) -> bool {
        matches!(self, Self::Branch)
    }

    /// Returns `true` for edges into an exception handler.
    #[must_use]
    pub const fn is_exceptional(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }
}

/// An edge from one instruction position to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The target instruction position.
    target: usize,
    /// The kind of control flow this edge represents.
    kind: EdgeKind,
}

impl Edge {
    /// Creates a new edge.
    #[must_use]
    pub const fn new(target: usize, kind: EdgeKind) -> Self {
        Self { target, kind }
    }

    /// Returns the target instruction position.
    #[must_use]
    pub const fn target(&self) -> usize {
        self.target
    }

    /// Returns the kind of control flow this edge represents.
    #[must_use]
    pub const fn kind(&self) -> &EdgeKind {
        &self.kind
    }
}
