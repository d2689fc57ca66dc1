use std::time::Duration;

use blast_formats::CompositeLayout;
use serde::Serialize;

use crate::error::CatalogError;

/// Tiles stitched into one image, in the order the layout expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composite {
    pub name: Option<String>,
    pub layout: CompositeLayout,
    pub addresses: Vec<u32>,
}

impl Composite {
    pub fn new(layout: CompositeLayout, addresses: Vec<u32>) -> Self {
        Self {
            name: None,
            layout,
            addresses,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name: the manifest name, else the first tile's address.
    pub fn label(&self) -> String {
        match (&self.name, self.addresses.first()) {
            (Some(name), _) => name.clone(),
            (None, Some(first)) => format!("0x{first:06X}"),
            (None, None) => String::from("<empty>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationFrames {
    Tiles(Vec<u32>),
    Composites(Vec<Composite>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animation {
    pub name: String,
    pub frames: AnimationFrames,
}

/// What a single animation frame draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTarget<'a> {
    Tile(u32),
    Composite(&'a Composite),
}

impl Animation {
    pub fn tiles(name: impl Into<String>, addresses: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            frames: AnimationFrames::Tiles(addresses),
        }
    }

    pub fn composites(name: impl Into<String>, frames: Vec<Composite>) -> Self {
        Self {
            name: name.into(),
            frames: AnimationFrames::Composites(frames),
        }
    }

    pub fn frame_count(&self) -> usize {
        match &self.frames {
            AnimationFrames::Tiles(addresses) => addresses.len(),
            AnimationFrames::Composites(frames) => frames.len(),
        }
    }

    /// Address of the first tile of the first frame.
    pub fn start(&self) -> Option<u32> {
        self.addresses().into_iter().next()
    }

    /// Every tile address the animation touches, frame by frame.
    pub fn addresses(&self) -> Vec<u32> {
        match &self.frames {
            AnimationFrames::Tiles(addresses) => addresses.clone(),
            AnimationFrames::Composites(frames) => frames
                .iter()
                .flat_map(|frame| frame.addresses.iter().copied())
                .collect(),
        }
    }

    pub fn layout(&self) -> Option<CompositeLayout> {
        match &self.frames {
            AnimationFrames::Tiles(_) => None,
            AnimationFrames::Composites(frames) => frames.first().map(|frame| frame.layout),
        }
    }

    pub fn frame(&self, index: usize) -> Option<FrameTarget<'_>> {
        match &self.frames {
            AnimationFrames::Tiles(addresses) => {
                addresses.get(index).copied().map(FrameTarget::Tile)
            }
            AnimationFrames::Composites(frames) => frames.get(index).map(FrameTarget::Composite),
        }
    }
}

/// Frame clock for an animation. Holds no reference to the animation so the
/// catalog can be borrowed separately when the current frame is rendered.
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    frame: usize,
    frame_count: usize,
    interval: Duration,
    elapsed: Duration,
}

impl AnimationPlayer {
    pub fn new(animation: &Animation, interval: Duration) -> Result<Self, CatalogError> {
        let frame_count = animation.frame_count();
        if frame_count == 0 {
            return Err(CatalogError::EmptyAnimation(animation.name.clone()));
        }
        Ok(Self {
            frame: 0,
            frame_count,
            interval,
            elapsed: Duration::ZERO,
        })
    }

    pub fn current_index(&self) -> usize {
        self.frame
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn advance_frame(&mut self) -> usize {
        self.frame = (self.frame + 1) % self.frame_count;
        self.frame
    }

    /// Advances once per whole interval in `delta`; the remainder carries over.
    /// Returns how many frames were stepped.
    pub fn tick(&mut self, delta: Duration) -> usize {
        if self.interval.is_zero() {
            return 0;
        }
        self.elapsed += delta;
        let mut steps = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            self.advance_frame();
            steps += 1;
        }
        steps
    }

    /// Playback time, in seconds, at which step `step` of a run is shown.
    pub fn seconds_at(&self, step: usize) -> f64 {
        self.interval.as_secs_f64() * step as f64
    }

    pub fn current<'a>(&self, animation: &'a Animation) -> Option<FrameTarget<'a>> {
        animation.frame(self.frame)
    }

    pub fn reset(&mut self) {
        self.frame = 0;
        self.elapsed = Duration::ZERO;
    }
}
