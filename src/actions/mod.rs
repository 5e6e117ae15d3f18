//! Built-in actions

pub mod choose_ui_block;

pub use choose_ui_block::{
    ChooseUiBlockAction, ChooseUiBlockInput, ChooseUiBlockOutput, CHOOSE_UI_BLOCK,
};
