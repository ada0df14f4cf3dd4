use streamdeck_lib::prelude::*;
use streamdeck_poller::HostEvent;

use crate::bridge;
use crate::state::{config_from_globals, load_global_config};

/// Shows the latest reading of an HTTP resource and refreshes it on a timer.
///
/// streamdeck-lib creates one of these per key; all state lives in the shared
/// controller, this only forwards the key's lifecycle to it.
#[derive(Default)]
pub struct PollAction {
    on_screen: bool,
    // true between the appear we forwarded and the matching disappear
    visible: bool,
    settings_requested: bool,
}

impl ActionStatic for PollAction {
    const ID: &'static str = super::ids::POLL;
}

impl Action for PollAction {
    fn id(&self) -> &str {
        Self::ID
    }

    fn init(&mut self, cx: &Context, ctx_id: &str) {
        self.on_screen = true;
        bridge::publish_config(load_global_config(cx));
        self.request_settings(cx, ctx_id);
    }

    fn did_receive_settings(&mut self, cx: &Context, ev: &incoming::DidReceiveSettings) {
        self.settings_requested = false;
        if !self.on_screen {
            // answer to a request made before the key went away
            return;
        }
        let context = ev.context.to_string();
        let settings = ev.settings.clone();

        let event = if self.visible {
            HostEvent::SettingsChanged { context, settings }
        } else {
            // first settings after (re)appearing: this is the appear
            self.visible = true;
            HostEvent::Appear { context, settings }
        };
        bridge::send(cx, event);
    }

    fn will_appear(&mut self, cx: &Context, ev: &incoming::WillAppear) {
        // Back from a profile/page switch: settings arrive before the appear
        // is forwarded.
        self.on_screen = true;
        if !self.visible {
            self.request_settings(cx, ev.context);
        }
    }

    fn will_disappear(&mut self, cx: &Context, ev: &incoming::WillDisappear) {
        self.hide(cx, ev.context);
    }

    fn teardown(&mut self, cx: &Context, ctx_id: &str) {
        self.hide(cx, ctx_id);
    }

    fn did_receive_global_settings(&mut self, _cx: &Context, ev: &incoming::DidReceiveGlobalSettings) {
        bridge::publish_config(config_from_globals(&ev.settings));
    }

    fn key_up(&mut self, cx: &Context, ev: &incoming::KeyUp) {
        bridge::send(
            cx,
            HostEvent::Interaction {
                context: ev.context.to_string(),
            },
        );
    }
}

impl PollAction {
    fn request_settings(&mut self, cx: &Context, ctx_id: &str) {
        if !self.settings_requested {
            self.settings_requested = true;
            cx.sd().get_settings(ctx_id);
        }
    }

    fn hide(&mut self, cx: &Context, ctx_id: &str) {
        self.on_screen = false;
        self.settings_requested = false;
        if self.visible {
            self.visible = false;
            bridge::send(
                cx,
                HostEvent::Disappear {
                    context: ctx_id.to_string(),
                },
            );
        }
    }
}
