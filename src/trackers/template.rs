use crate::trackers::{TrackerFactory, VisualTracker};
use crate::utils::bbox::BoundingBox;
use crate::utils::blob::validate_frame;
use crate::Errors;
use anyhow::Result;
use image::imageops::{crop_imm, grayscale, resize, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use log::debug;

/// Default size of the search window relative to the last box
pub const DEFAULT_SEARCH_SCALE: f32 = 2.0;

/// Default minimal similarity of the best match that keeps the track alive
pub const DEFAULT_MIN_SCORE: f32 = 0.8;

/// Default longer side of the downscaled template used for the coarse search
pub const DEFAULT_COARSE_SIDE: u32 = 64;

/// Template tracker configuration
///
#[derive(Debug, Clone, Copy)]
pub struct TemplateTrackerOptions {
    search_scale: f32,
    min_score: f32,
    coarse_side: u32,
}

impl Default for TemplateTrackerOptions {
    fn default() -> Self {
        Self {
            search_scale: DEFAULT_SEARCH_SCALE,
            min_score: DEFAULT_MIN_SCORE,
            coarse_side: DEFAULT_COARSE_SIDE,
        }
    }
}

impl TemplateTrackerOptions {
    /// The search window is the last box scaled around its center by the factor
    ///
    pub fn search_scale(mut self, scale: f32) -> Self {
        assert!(scale >= 1.0, "Search scale must not be less than 1.0");
        self.search_scale = scale;
        self
    }

    /// The best match similarity below the threshold is reported as the loss of the track.
    ///
    /// The similarity is `1 - MSE / 255²` computed over grayscale pixels.
    ///
    pub fn min_score(mut self, score: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&score),
            "Minimal score must be within [0, 1]"
        );
        self.min_score = score;
        self
    }

    /// Templates with a longer side exceeding the value are first matched downscaled to it, then
    /// the match is refined at the full resolution around the coarse location
    ///
    pub fn coarse_side(mut self, side: u32) -> Self {
        assert!(side >= 8, "Coarse template side must be at least 8 pixels");
        self.coarse_side = side;
        self
    }
}

impl TrackerFactory for TemplateTrackerOptions {
    fn create(&self) -> Box<dyn VisualTracker> {
        Box::new(TemplateTracker::new(*self))
    }
}

/// Tracker that follows the object by matching its last appearance around its last position
///
/// The matching itself is done by `imageproc` template matching with the sum of squared errors.
/// Large templates are matched coarse-to-fine. The template is refreshed from every accepted
/// match.
///
#[derive(Debug, Clone)]
pub struct TemplateTracker {
    options: TemplateTrackerOptions,
    template: Option<GrayImage>,
    bbox: Option<BoundingBox>,
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(TemplateTrackerOptions::default())
    }
}

/// Integer pixel rectangle `(x, y, width, height)` inside the frame
///
fn pixel_rect(bbox: &BoundingBox, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
    let bbox = bbox.clip(frame_width as f32, frame_height as f32)?;
    let x = bbox.x().floor() as u32;
    let y = bbox.y().floor() as u32;
    let width = (bbox.width().round() as u32).min(frame_width - x);
    let height = (bbox.height().round() as u32).min(frame_height - y);
    if width == 0 || height == 0 {
        None
    } else {
        Some((x, y, width, height))
    }
}

impl TemplateTracker {
    pub fn new(options: TemplateTrackerOptions) -> Self {
        Self {
            options,
            template: None,
            bbox: None,
        }
    }

    fn similarity(sse: f32, template: &GrayImage) -> f32 {
        let n = (template.width() * template.height()) as f32;
        1.0 - sse / (n * 255.0 * 255.0)
    }

    /// Location of the best match inside the window with its sum of squared errors
    ///
    fn best_match(window: &GrayImage, template: &GrayImage) -> ((u32, u32), f32) {
        let scores = match_template(window, template, MatchTemplateMethod::SumOfSquaredErrors);
        let extremes = find_extremes(&scores);
        (extremes.min_value_location, extremes.min_value)
    }

    /// Searches the template in the window, the window must not be smaller than the template
    ///
    fn search(&self, window: &GrayImage, template: &GrayImage) -> ((u32, u32), f32) {
        let (tw, th) = template.dimensions();
        let factor = self.options.coarse_side as f32 / tw.max(th) as f32;
        if factor >= 1.0 {
            return Self::best_match(window, template);
        }

        let scaled = |v: u32| ((v as f32 * factor).round() as u32).max(1);
        let (ww, wh) = window.dimensions();
        let coarse_template = resize(template, scaled(tw), scaled(th), FilterType::Triangle);
        let coarse_window = resize(window, scaled(ww), scaled(wh), FilterType::Triangle);
        let ((cx, cy), _) = Self::best_match(&coarse_window, &coarse_template);

        let radius = (1.0 / factor).ceil() as u32 + 1;
        let (max_x, max_y) = (ww - tw, wh - th);
        let cx = ((cx as f32 / factor).round() as u32).min(max_x);
        let cy = ((cy as f32 / factor).round() as u32).min(max_y);
        let (x0, y0) = (cx.saturating_sub(radius), cy.saturating_sub(radius));
        let (x1, y1) = ((cx + radius).min(max_x), (cy + radius).min(max_y));

        let area = crop_imm(window, x0, y0, x1 - x0 + tw, y1 - y0 + th).to_image();
        let ((fx, fy), sse) = Self::best_match(&area, template);
        ((x0 + fx, y0 + fy), sse)
    }
}

impl VisualTracker for TemplateTracker {
    fn init(&mut self, frame: &RgbImage, bbox: &BoundingBox) -> Result<()> {
        validate_frame(frame)?;
        let (x, y, width, height) = pixel_rect(bbox, frame.width(), frame.height())
            .ok_or(Errors::DegenerateBox(bbox.width()))?;

        let gray = grayscale(frame);
        self.template = Some(crop_imm(&gray, x, y, width, height).to_image());
        self.bbox = Some(BoundingBox::new(
            x as f32,
            y as f32,
            width as f32,
            height as f32,
        ));
        Ok(())
    }

    fn update(&mut self, frame: &RgbImage) -> Result<Option<BoundingBox>> {
        let (template, bbox) = match (&self.template, &self.bbox) {
            (Some(t), Some(b)) => (t, b),
            _ => return Err(Errors::TrackerNotInitialized.into()),
        };
        validate_frame(frame)?;

        let search = bbox.scale(self.options.search_scale);
        let (sx, sy, sw, sh) = match pixel_rect(&search, frame.width(), frame.height()) {
            Some(r) => r,
            None => return Ok(None),
        };
        if sw < template.width() || sh < template.height() {
            debug!("Search window {}x{} is smaller than the template", sw, sh);
            return Ok(None);
        }

        let window = grayscale(&crop_imm(frame, sx, sy, sw, sh).to_image());
        let ((mx, my), sse) = self.search(&window, template);
        let score = Self::similarity(sse, template);

        if score < self.options.min_score {
            debug!(
                "Best match similarity {:.3} is below {:.3}",
                score, self.options.min_score
            );
            return Ok(None);
        }

        let (width, height) = (template.width(), template.height());
        let found = BoundingBox::new(
            (sx + mx) as f32,
            (sy + my) as f32,
            width as f32,
            height as f32,
        );

        self.template = Some(crop_imm(&window, mx, my, width, height).to_image());
        self.bbox = Some(found);
        Ok(Some(found))
    }
}
