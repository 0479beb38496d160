//! dwgview Viewer - browser front end
//!
//! Uploads a DWG drawing to the conversion server, loads the resulting glTF
//! and frames it in front of an orbit camera. Camera math lives in
//! `dwgview-core`; this crate wires it to Bevy and the DOM.

mod app;
mod camera;
mod models;
mod scene;
mod ui;
mod upload;

use wasm_bindgen::prelude::*;

/// WASM entry point
#[wasm_bindgen(start)]
pub fn main() {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    app::run();
}
