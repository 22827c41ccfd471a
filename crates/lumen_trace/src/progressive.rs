//! Background progressive rendering.
//!
//! A worker thread runs render passes until the sample budget is reached or
//! it is asked to stop. After every pass it publishes the running average,
//! so a caller can poll `snapshot` while the render converges.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use lumen_scene::Scene;

use crate::bvh::Intersector;
use crate::error::TraceResult;
use crate::lights::LightSet;
use crate::params::Params;
use crate::render::{get_render, make_state, render_samples, Image, RenderState};

pub struct ProgressiveRender {
    stop: Arc<AtomicBool>,
    samples: Arc<AtomicU32>,
    display: Arc<Mutex<Image>>,
    handle: Option<JoinHandle<RenderState>>,
}

impl ProgressiveRender {
    /// Validate the setup and launch the worker.
    pub fn start(
        scene: Arc<Scene>,
        bvh: Arc<dyn Intersector>,
        lights: Arc<LightSet>,
        params: Params,
    ) -> TraceResult<Self> {
        let mut state = make_state(&scene, &params)?;

        let stop = Arc::new(AtomicBool::new(false));
        let samples = Arc::new(AtomicU32::new(0));
        let display = Arc::new(Mutex::new(Image::new(state.width, state.height)));

        let handle = {
            let stop = Arc::clone(&stop);
            let samples = Arc::clone(&samples);
            let display = Arc::clone(&display);
            thread::spawn(move || {
                while !stop.load(Ordering::Acquire) && state.samples < params.samples {
                    render_samples(&mut state, &scene, bvh.as_ref(), &lights, &params);
                    let image = get_render(&state);
                    *display.lock().unwrap_or_else(PoisonError::into_inner) = image;
                    samples.store(state.samples, Ordering::Release);
                }
                log::debug!("Progressive worker done after {} passes", state.samples);
                state
            })
        };

        Ok(Self {
            stop,
            samples,
            display,
            handle: Some(handle),
        })
    }

    /// Passes published so far.
    pub fn samples(&self) -> u32 {
        self.samples.load(Ordering::Acquire)
    }

    /// True once the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Copy of the most recently published average.
    pub fn snapshot(&self) -> Image {
        self.display
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ask the worker to stop after its current pass and join it.
    pub fn stop(&mut self) -> Option<RenderState> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Join the worker once it has used up the sample budget.
    pub fn wait(&mut self) -> Option<RenderState> {
        self.join()
    }

    fn join(&mut self) -> Option<RenderState> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(state) => Some(state),
            Err(_) => {
                log::error!("Progressive render worker panicked");
                None
            }
        }
    }
}

impl Drop for ProgressiveRender {
    fn drop(&mut self) {
        self.stop();
    }
}
