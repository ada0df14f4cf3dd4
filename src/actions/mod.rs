pub mod poll;

pub mod ids {
    use crate::PLUGIN_ID;

    pub const POLL: &str = const_format::concatcp!(PLUGIN_ID, ".poll");
}
