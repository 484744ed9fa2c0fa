pub mod command;
pub mod element;
pub mod render;
pub mod theme;
pub mod widgets;

pub use command::Command;
pub use element::{ColumnBuilder, Element, FocusId, Layer, LayoutConstraint, RowBuilder};
pub use theme::{Theme, ThemeVariant};
