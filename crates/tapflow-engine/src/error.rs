use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("flow must contain at least one node")]
    NoNodes,

    #[error("no Start node found in flow")]
    NoStartNode,
}
