use crate::platform::events;
use focusroom_core::ClientEvent;
use wasm_bindgen_futures::JsFuture;

/// Copy `text` to the system clipboard and report its length to the server.
/// The report is only sent after the write resolves.
pub async fn copy_text(text: String) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let promise = window.navigator().clipboard().write_text(&text);
    match JsFuture::from(promise).await {
        Ok(_) => {
            log::info!("Copied {} chars", text.chars().count());
            events::push(&ClientEvent::ContentCopied {
                text_length: text.chars().count(),
            });
        }
        Err(e) => log::warn!("Clipboard write failed: {:?}", e),
    }
}
