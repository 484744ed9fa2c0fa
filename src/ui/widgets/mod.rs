pub mod autocomplete;
pub mod select;
pub mod text_input;

pub use autocomplete::AutocompleteState;
pub use select::SelectState;
pub use text_input::TextInputState;
