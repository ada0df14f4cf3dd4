use streamdeck_lib::Context;
use streamdeck_poller::{Face, Host, HostError, Settings};

use crate::render::render_face;

/// [`Host`] over a streamdeck-lib [`Context`].
pub struct DeckHost {
    cx: Context,
}

impl DeckHost {
    pub fn new(cx: Context) -> Self {
        Self { cx }
    }
}

impl Host for DeckHost {
    fn show(&self, context: &str, face: &Face) -> Result<(), HostError> {
        render_face(&self.cx, context, face)
    }

    fn write_settings(&self, context: &str, settings: &Settings) -> Result<(), HostError> {
        self.cx.sd().set_settings(context, settings.clone());
        Ok(())
    }

    fn alert(&self, context: &str) -> Result<(), HostError> {
        self.cx.sd().show_alert(context);
        Ok(())
    }
}
