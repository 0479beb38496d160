//! DWG upload to the conversion server and `?model=` start-up loading
//!
//! Drawings arrive from the file dialog or from a drop onto the page. The
//! browser side runs in JavaScript callbacks; results are queued behind a
//! mutex and drained by a Bevy system each frame.

use bevy::prelude::*;
use tracing::{info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dwgview_core::upload::{validate_upload, MAX_UPLOAD_BYTES};

use crate::app::StatusMessage;
use crate::models::LoadModel;

const BUSY_MESSAGE: &str = "A conversion is already in progress";

pub struct UploadPlugin;

impl Plugin for UploadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<UploadState>()
            .init_resource::<UploadQueue>()
            .add_message::<OpenDwgPicker>()
            .add_systems(Startup, (check_model_parameter, install_drop_target))
            .add_systems(Update, (open_picker, process_upload_results).chain());
    }
}

/// Ask for the browser file dialog
#[derive(Message, Debug, Clone, Copy)]
pub struct OpenDwgPicker;

/// Upload currently being converted, as seen by the UI
#[derive(Resource, Default)]
pub struct UploadState {
    pub in_flight: Option<String>,
}

#[derive(Debug, Clone)]
pub enum UploadEvent {
    Started { file_name: String },
    /// Not sent: failed validation or another conversion was running
    Rejected { file_name: String, reason: String },
    Finished {
        file_name: String,
        result: Result<String, String>,
    },
}

/// Shared with the JavaScript callbacks
#[derive(Resource, Default, Clone)]
pub struct UploadQueue {
    events: Arc<Mutex<VecDeque<UploadEvent>>>,
    busy: Arc<AtomicBool>,
    dragging: Arc<AtomicBool>,
}

impl UploadQueue {
    fn push(&self, event: UploadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
        }
    }

    /// Claim the single conversion slot
    fn try_begin(&self) -> bool {
        !self.busy.swap(true, Ordering::SeqCst)
    }

    fn finish(&self) {
        self.busy.store(false, Ordering::SeqCst);
    }

    /// Check a picked or dropped file and claim the conversion slot for it.
    ///
    /// Returns true when the caller should send the file.
    fn admit(&self, file_name: &str, size: u64) -> bool {
        if let Err(rejection) = validate_upload(file_name, size, MAX_UPLOAD_BYTES) {
            self.push(UploadEvent::Rejected {
                file_name: file_name.to_string(),
                reason: rejection.to_string(),
            });
            return false;
        }
        if !self.try_begin() {
            self.push(UploadEvent::Rejected {
                file_name: file_name.to_string(),
                reason: BUSY_MESSAGE.to_string(),
            });
            return false;
        }
        self.push(UploadEvent::Started {
            file_name: file_name.to_string(),
        });
        true
    }

    fn set_dragging(&self, dragging: bool) {
        self.dragging.store(dragging, Ordering::SeqCst);
    }

    /// A file is being dragged over the page
    pub fn is_dragging(&self) -> bool {
        self.dragging.load(Ordering::SeqCst)
    }

    fn drain(&self) -> Vec<UploadEvent> {
        self.events
            .try_lock()
            .map(|mut events| events.drain(..).collect())
            .unwrap_or_default()
    }
}

/// Load `?model=<url>` on start-up
fn check_model_parameter(mut load: MessageWriter<LoadModel>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Ok(href) = window.location().href() else {
        return;
    };
    let Ok(url) = web_sys::Url::new(&href) else {
        return;
    };
    if let Some(model) = url.search_params().get("model") {
        info!(url = %model, "Loading model from URL parameter");
        load.write(LoadModel { url: model });
    }
}

fn install_drop_target(queue: Res<UploadQueue>) {
    browser::install_drop_target(queue.clone());
}

fn open_picker(
    mut requests: MessageReader<OpenDwgPicker>,
    state: Res<UploadState>,
    queue: Res<UploadQueue>,
    mut status: ResMut<StatusMessage>,
) {
    if requests.read().count() == 0 {
        return;
    }
    if state.in_flight.is_some() {
        status.error(BUSY_MESSAGE);
        return;
    }
    browser::open_dwg_picker(queue.clone());
}

fn process_upload_results(
    queue: Res<UploadQueue>,
    mut state: ResMut<UploadState>,
    mut status: ResMut<StatusMessage>,
    mut load: MessageWriter<LoadModel>,
) {
    for event in queue.drain() {
        match event {
            UploadEvent::Started { file_name } => {
                info!(file = %file_name, "Uploading drawing");
                status.info(format!("Uploading and converting {file_name}..."));
                state.in_flight = Some(file_name);
            }
            UploadEvent::Rejected { file_name, reason } => {
                warn!(file = %file_name, reason = %reason, "Upload refused");
                status.error(reason);
            }
            UploadEvent::Finished { file_name, result } => {
                state.in_flight = None;
                match result {
                    Ok(model_url) => {
                        info!(file = %file_name, url = %model_url, "Conversion finished");
                        status.success(format!("Converted {file_name}"));
                        load.write(LoadModel { url: model_url });
                    }
                    Err(e) => {
                        warn!(file = %file_name, error = %e, "Conversion failed");
                        status.error(e);
                    }
                }
            }
        }
    }
}

mod browser {
    use super::{UploadEvent, UploadQueue};
    use dwgview_core::upload::{ConvertResponse, UPLOAD_FIELD};
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;
    use web_sys::{DragEvent, FormData, HtmlInputElement, Request, RequestInit, Response};

    const CONVERT_ENDPOINT: &str = "/api/convert";

    fn js_error(value: JsValue) -> String {
        value
            .as_string()
            .unwrap_or_else(|| format!("{value:?}"))
    }

    /// Show the file dialog; the chosen drawing is validated and posted
    pub fn open_dwg_picker(queue: UploadQueue) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };
        let input: HtmlInputElement = match document
            .create_element("input")
            .ok()
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
        {
            Some(input) => input,
            None => {
                tracing::error!("Failed to create file input");
                return;
            }
        };
        input.set_type("file");
        input.set_accept(".dwg");
        input.style().set_property("display", "none").ok();
        if let Some(body) = document.body() {
            if body.append_child(&input).is_err() {
                tracing::error!("Failed to attach file input");
                return;
            }
        }

        let input_clone = input.clone();
        let on_change = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let file = input_clone.files().and_then(|files| files.get(0));
            if let Some(parent) = input_clone.parent_node() {
                parent.remove_child(&input_clone).ok();
            }
            if let Some(file) = file {
                submit(&queue, file);
            }
        }) as Box<dyn FnMut(_)>);

        input.set_onchange(Some(on_change.as_ref().unchecked_ref()));
        on_change.forget();
        input.click();
    }

    /// Accept drawings dropped anywhere on the page
    pub fn install_drop_target(queue: UploadQueue) {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return;
        };

        let over_queue = queue.clone();
        let on_dragover = Closure::wrap(Box::new(move |event: DragEvent| {
            // Without this the browser opens the file itself
            event.prevent_default();
            if let Some(transfer) = event.data_transfer() {
                transfer.set_drop_effect("copy");
            }
            over_queue.set_dragging(true);
        }) as Box<dyn FnMut(_)>);

        let leave_queue = queue.clone();
        let on_dragleave = Closure::wrap(Box::new(move |_event: DragEvent| {
            leave_queue.set_dragging(false);
        }) as Box<dyn FnMut(_)>);

        let on_drop = Closure::wrap(Box::new(move |event: DragEvent| {
            event.prevent_default();
            queue.set_dragging(false);
            let file = event
                .data_transfer()
                .and_then(|transfer| transfer.files())
                .and_then(|files| files.get(0));
            if let Some(file) = file {
                submit(&queue, file);
            }
        }) as Box<dyn FnMut(_)>);

        for (name, callback) in [
            ("dragover", &on_dragover),
            ("dragleave", &on_dragleave),
            ("drop", &on_drop),
        ] {
            if document
                .add_event_listener_with_callback(name, callback.as_ref().unchecked_ref())
                .is_err()
            {
                tracing::error!(event = name, "Failed to register drop handler");
            }
        }
        on_dragover.forget();
        on_dragleave.forget();
        on_drop.forget();
    }

    /// Validate and post one drawing, reporting through the queue
    fn submit(queue: &UploadQueue, file: web_sys::File) {
        let file_name = file.name();
        if !queue.admit(&file_name, file.size() as u64) {
            return;
        }
        let queue = queue.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let result = post_drawing(&file).await;
            queue.finish();
            queue.push(UploadEvent::Finished { file_name, result });
        });
    }

    /// POST the drawing; returns the converted model URL
    async fn post_drawing(file: &web_sys::File) -> Result<String, String> {
        let window = web_sys::window().ok_or("No window")?;

        let form = FormData::new().map_err(js_error)?;
        form.append_with_blob_and_filename(UPLOAD_FIELD, file, &file.name())
            .map_err(js_error)?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&form);
        let request = Request::new_with_str_and_init(CONVERT_ENDPOINT, &init).map_err(js_error)?;

        let resp = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(|e| format!("Upload failed: {}", js_error(e)))?;
        let resp: Response = resp.dyn_into().map_err(|_| "Response cast failed")?;
        let status = resp.status();

        let text = JsFuture::from(resp.text().map_err(js_error)?)
            .await
            .map_err(js_error)?
            .as_string()
            .ok_or("Response body was not text")?;
        let body: ConvertResponse = serde_json::from_str(&text)
            .map_err(|e| format!("Unexpected server response (HTTP {status}): {e}"))?;

        match body {
            ConvertResponse {
                success: true,
                model_url: Some(url),
                ..
            } => Ok(url),
            ConvertResponse { error, .. } => {
                Err(error.unwrap_or_else(|| format!("Conversion failed (HTTP {status})")))
            }
        }
    }
}
