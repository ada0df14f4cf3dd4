use std::sync::OnceLock;

use streamdeck_lib::Context;
use streamdeck_poller::{Face, HostError};
use streamdeck_render::{Canvas, FontHandle, FontRegistry, TextOptions, WrapOptions, wrap_text};

static FONT: OnceLock<FontHandle> = OnceLock::new();

const SIZES: [f32; 5] = [56.0, 44.0, 36.0, 28.0, 20.0];
// leave a small margin inside 144px
const MAX_WIDTH: f32 = 136.0;

fn font() -> &'static FontHandle {
    FONT.get_or_init(|| {
        let mut reg = FontRegistry::new();
        reg.load_bytes(
            "mono",
            include_bytes!("../icu.veelume.poller.sdPlugin/fonts/DejaVuSansMono-Bold.ttf"),
        )
        .expect("embedded font must load")
    })
}

/// Render a key face onto a Stream Deck button (144×144 PNG).
pub fn render_face(cx: &Context, ctx_id: &str, face: &Face) -> Result<(), HostError> {
    let font = font();
    let text = face.label();
    let size = fit_size(text);
    let lines = wrap_text(font, size, text, &wrap_options());

    let mut canvas = Canvas::key_icon();
    if !lines.is_empty() {
        canvas.draw_text(&lines, &TextOptions::new(font.clone(), size)).ok();
    }

    let Ok(data_url) = canvas.finish().to_data_url() else {
        return Err(HostError::Call("key image encoding failed".into()));
    };
    cx.sd().set_image(ctx_id, Some(data_url), None, None);
    Ok(())
}

fn wrap_options() -> WrapOptions {
    WrapOptions {
        max_width: MAX_WIDTH,
        max_lines: 1,
    }
}

/// Largest size from the ladder at which the text fits on one line.
fn fit_size(text: &str) -> f32 {
    let opts = wrap_options();
    SIZES
        .iter()
        .copied()
        .find(|&size| {
            let lines = wrap_text(font(), size, text, &opts);
            lines.len() == 1 && lines[0].width_px <= MAX_WIDTH
        })
        .unwrap_or(SIZES[SIZES.len() - 1])
}
