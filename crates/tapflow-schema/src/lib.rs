pub mod error;
pub mod flow;
pub mod node;
pub mod raw;
pub mod values;

pub use error::{ParseError, ValidationError, ValidationErrors};
pub use flow::{Edge, Flow, FlowMetadata, SCHEMA_VERSION};
pub use node::{
    DelayConfig, KeyPressConfig, MouseButton, MouseClickConfig, MouseMoveConfig, MoveTarget, Node,
    NodeConfig, NodeKind, NodeMetadata, Position, TypeStringConfig,
};
pub use values::{
    Coordinate, Duration, DurationRange, KeyCombination, KeyModifier, Offset, ScrollConfig,
    ScrollDirection, TimeUnit,
};
