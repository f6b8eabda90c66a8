use thiserror::Error;

// ── GraphError ────────────────────────────────────────────────────────────────

/// Every error that can cross the public boundary.
///
/// Anything not listed here is recovered internally (NaN positions are
/// re-jittered, degenerate quadtree cells coalesce into their parent) and at
/// most logged.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The GPU stack is missing a required capability.  Returned only by the
    /// init path; no renderer is constructed, so no further calls are possible.
    #[error("gpu unsupported: {reason}")]
    Unsupported { reason: String },

    /// An edge referenced a node id that is not part of the load.  The load
    /// is rejected wholesale and the previously loaded graph stays intact.
    #[error("edge references unknown node id {id:?}")]
    InvalidTopology { id: String },

    /// A color string failed to parse.  Accepted forms: `#rgb`, `#rrggbb`,
    /// `#rrggbbaa`, `rgb(...)`, `rgba(...)`, `hsl(...)`, `hsla(...)`.
    #[error("invalid color {value:?}")]
    InvalidColor { value: String },

    /// A newer `load` started while this one was awaiting its upload fence.
    /// The newer load proceeds; this one rejects without touching state.
    #[error("load superseded by a newer load")]
    LoadSuperseded,

    /// The MSDF atlas bytes could not be decoded.  Labels stay disabled;
    /// every other layer is unaffected.
    #[error("label atlas failed: {reason}")]
    AtlasFetchFailed { reason: String },

    /// The GPU device was lost.  The renderer is in a terminal state and all
    /// methods are no-ops from here on.
    #[error("gpu device lost")]
    DeviceLost,
}

pub type Result<T> = std::result::Result<T, GraphError>;
