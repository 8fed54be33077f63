//! Annotation overlay state: display modes, layout geometry and click
//! handling for one video's annotations.
//!
//! Nothing here draws. [`OverlayState::layout`] returns canvas-space
//! rectangles for boxes and icons; a front end paints them.

use std::collections::HashSet;

use ppe_core::annotation::{
    detections_for_video_frame, parse_annotation_file, summarize, AnnotationFile, ComplianceClass,
    ComplianceSummary, Detection, ObjectId,
};
use ppe_core::error::CoreError;
use ppe_core::types::FrameNumber;

/// Edge length of alert and detail icons, in canvas pixels.
pub const ICON_SIZE: f64 = 28.0;
/// Gap between the alert icon and the first detail icon.
const DETAIL_GAP: f64 = 10.0;
/// Extra space between consecutive detail icons.
const DETAIL_SPACING: f64 = 25.0;
/// Inset used when detail icons are placed inside the box.
const DETAIL_INSET: f64 = 5.0;

const WHITE: [u8; 3] = [255, 255, 255];
const RED: [u8; 3] = [255, 0, 0];
const ORANGE: [u8; 3] = [255, 165, 0];
const YELLOW: [u8; 3] = [255, 255, 0];

/// Maps source-pixel coordinates onto the canvas: `x / scale_x + offset_x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Viewport {
    /// A canvas showing the frame at native size.
    pub fn identity(canvas_width: f64, canvas_height: f64) -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            canvas_width,
            canvas_height,
        }
    }

    pub fn project(&self, detection: &Detection) -> Rect {
        Rect {
            x: detection.x / self.scale_x + self.offset_x,
            y: detection.y / self.scale_y + self.offset_y,
            w: detection.w / self.scale_x,
            h: detection.h / self.scale_y,
        }
    }
}

/// Axis-aligned canvas rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    fn square(x: f64, y: f64, size: f64) -> Self {
        Self { x, y, w: size, h: size }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    #[default]
    Off,
    /// Every detection, colored by its primary class.
    AllBoxes,
    /// Non-compliant detections with alert icons.
    Alerts,
}

/// Identifies a revealed detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevealKey {
    pub object: ObjectId,
    pub class: ComplianceClass,
}

impl RevealKey {
    fn for_detection(detection: &Detection) -> Option<Self> {
        detection.primary.map(|class| Self {
            object: detection.id.clone(),
            class,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxKind {
    Plain,
    Alert,
    Revealed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub id: ObjectId,
    pub rect: Rect,
    pub color: [u8; 3],
    pub kind: BoxKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertIcon {
    pub key: RevealKey,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailIcon {
    pub key: RevealKey,
    pub class: ComplianceClass,
    pub rect: Rect,
}

/// Everything to paint for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLayout {
    pub boxes: Vec<OverlayBox>,
    pub alert_icons: Vec<AlertIcon>,
    pub detail_icons: Vec<DetailIcon>,
    pub summary: ComplianceSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// A detection's details were shown or hidden.
    Toggled { key: RevealKey, revealed: bool },
    /// A compliant box was hit.
    Ignored,
    /// Empty canvas; all details hidden.
    Cleared,
}

/// Box color for a detection's primary class.
pub fn class_color(class: Option<ComplianceClass>) -> [u8; 3] {
    match class {
        Some(ComplianceClass::GownImproper | ComplianceClass::MaskImproper) => ORANGE,
        Some(ComplianceClass::MaskRemoved) => YELLOW,
        Some(_) => RED,
        None => WHITE,
    }
}

#[derive(Debug, Default)]
pub struct OverlayState {
    annotations: Option<AnnotationFile>,
    mode: DisplayMode,
    revealed: HashSet<RevealKey>,
}

impl OverlayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and install an annotation document. On error the current
    /// annotations stay in place.
    pub fn load_annotations(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let file = parse_annotation_file(bytes)?;
        self.set_annotations(file);
        Ok(())
    }

    pub fn set_annotations(&mut self, file: AnnotationFile) {
        tracing::debug!(frames = file.len(), "Annotations loaded");
        self.annotations = Some(file);
        self.revealed.clear();
    }

    pub fn has_annotations(&self) -> bool {
        self.annotations.is_some()
    }

    pub fn clear(&mut self) {
        self.annotations = None;
        self.revealed.clear();
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Flip "show all boxes"; turns alert mode off.
    pub fn toggle_all_boxes(&mut self) -> DisplayMode {
        self.mode = match self.mode {
            DisplayMode::AllBoxes => DisplayMode::Off,
            _ => DisplayMode::AllBoxes,
        };
        self.mode
    }

    /// Flip alert mode; turns "show all boxes" off.
    pub fn toggle_alerts(&mut self) -> DisplayMode {
        self.mode = match self.mode {
            DisplayMode::Alerts => DisplayMode::Off,
            _ => DisplayMode::Alerts,
        };
        self.mode
    }

    pub fn is_revealed(&self, key: &RevealKey) -> bool {
        self.revealed.contains(key)
    }

    /// Detections shown on a 1-based video frame.
    pub fn detections(&self, frame: FrameNumber) -> Vec<Detection> {
        self.annotations
            .as_ref()
            .map(|file| detections_for_video_frame(file, frame))
            .unwrap_or_default()
    }

    pub fn summary(&self, frame: FrameNumber) -> ComplianceSummary {
        summarize(&self.detections(frame))
    }

    /// Descriptions for every revealed detection on `frame`.
    pub fn revealed_details(&self, frame: FrameNumber) -> Vec<(ObjectId, Vec<&'static str>)> {
        self.detections(frame)
            .into_iter()
            .filter(|d| RevealKey::for_detection(d).is_some_and(|k| self.revealed.contains(&k)))
            .map(|d| {
                let descriptions = d.classes.iter().map(ComplianceClass::description).collect();
                (d.id, descriptions)
            })
            .collect()
    }

    pub fn layout(&self, frame: FrameNumber, viewport: &Viewport) -> OverlayLayout {
        let detections = self.detections(frame);
        let summary = summarize(&detections);
        let mut layout = OverlayLayout {
            boxes: Vec::new(),
            alert_icons: Vec::new(),
            detail_icons: Vec::new(),
            summary,
        };

        match self.mode {
            DisplayMode::Off => {}
            DisplayMode::AllBoxes => {
                layout.boxes = detections
                    .iter()
                    .map(|d| OverlayBox {
                        id: d.id.clone(),
                        rect: viewport.project(d),
                        color: class_color(d.primary),
                        kind: BoxKind::Plain,
                    })
                    .collect();
            }
            DisplayMode::Alerts => {
                for detection in &detections {
                    let Some(key) = RevealKey::for_detection(detection) else {
                        continue;
                    };
                    let rect = viewport.project(detection);
                    let revealed = self.revealed.contains(&key);
                    let icon = alert_icon_rect(&rect, viewport);

                    layout.boxes.push(OverlayBox {
                        id: detection.id.clone(),
                        rect,
                        color: RED,
                        kind: if revealed { BoxKind::Revealed } else { BoxKind::Alert },
                    });
                    if revealed {
                        layout.detail_icons.extend(
                            detail_icon_rects(&icon, &rect, viewport, detection.classes.len())
                                .into_iter()
                                .zip(&detection.classes)
                                .map(|(rect, class)| DetailIcon {
                                    key: key.clone(),
                                    class: *class,
                                    rect,
                                }),
                        );
                    }
                    layout.alert_icons.push(AlertIcon { key, rect: icon });
                }
            }
        }

        layout
    }

    /// Handle a click at canvas `(x, y)`.
    ///
    /// Alert icons are hit-tested first, then the box whose center is
    /// closest among those containing the point.
    pub fn handle_click(
        &mut self,
        frame: FrameNumber,
        viewport: &Viewport,
        x: f64,
        y: f64,
    ) -> ClickOutcome {
        let layout = self.layout(frame, viewport);
        let icon_hit = layout.alert_icons.into_iter().find(|icon| {
            let (cx, cy) = icon.rect.center();
            (x - cx).hypot(y - cy) <= icon.rect.w / 2.0
        });
        if let Some(icon) = icon_hit {
            return self.toggle(icon.key);
        }

        let detections = self.detections(frame);
        let closest = detections
            .iter()
            .filter_map(|d| {
                let rect = viewport.project(d);
                rect.contains(x, y).then(|| {
                    let (cx, cy) = rect.center();
                    (d, (x - cx).hypot(y - cy))
                })
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(d, _)| d);

        match closest {
            Some(detection) => match RevealKey::for_detection(detection) {
                Some(key) => self.toggle(key),
                None => ClickOutcome::Ignored,
            },
            None => {
                self.revealed.clear();
                ClickOutcome::Cleared
            }
        }
    }

    fn toggle(&mut self, key: RevealKey) -> ClickOutcome {
        let revealed = if self.revealed.remove(&key) {
            false
        } else {
            self.revealed.insert(key.clone());
            true
        };
        ClickOutcome::Toggled { key, revealed }
    }
}

/// Alert icon centered on the box's top-left corner, kept on the canvas.
fn alert_icon_rect(rect: &Rect, viewport: &Viewport) -> Rect {
    let x = (rect.x - ICON_SIZE / 2.0)
        .max(0.0)
        .min(viewport.canvas_width - ICON_SIZE);
    let y = (rect.y - ICON_SIZE / 2.0)
        .max(0.0)
        .min(viewport.canvas_height - ICON_SIZE);
    Rect::square(x, y, ICON_SIZE)
}

/// Place `count` detail icons: right of the alert icon, else left of it,
/// else inside the box. An icon that would leave the canvas moves to the
/// box's bottom-left interior, or is dropped if that does not fit either.
fn detail_icon_rects(icon: &Rect, rect: &Rect, viewport: &Viewport, count: usize) -> Vec<Rect> {
    let step = ICON_SIZE + DETAIL_SPACING;
    let mut x = icon.x + ICON_SIZE + DETAIL_GAP;
    let mut y = icon.y;

    if x + ICON_SIZE > viewport.canvas_width {
        x = icon.x - ICON_SIZE - DETAIL_GAP;
        if x < 0.0 {
            x = rect.x + DETAIL_INSET;
            y = rect.y + DETAIL_INSET;
        }
    }

    let mut placed = Vec::with_capacity(count);
    for _ in 0..count {
        let fits = x >= 0.0
            && y >= 0.0
            && x + ICON_SIZE <= viewport.canvas_width
            && y + ICON_SIZE <= viewport.canvas_height;
        if fits {
            placed.push(Rect::square(x, y, ICON_SIZE));
            x += step;
            continue;
        }

        x = rect.x + DETAIL_INSET;
        y = rect.y + rect.h - ICON_SIZE - DETAIL_INSET;
        if y >= 0.0 && x + ICON_SIZE <= viewport.canvas_width {
            placed.push(Rect::square(x, y, ICON_SIZE));
            x += step;
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const FRAME_ONE: &str = r#"{
        "00001": {
            "objects": [
                {
                    "id": 7,
                    "bbox": {"xmin": 100, "ymin": 100, "xmax": 200, "ymax": 300},
                    "attributes": {"gown": "GA", "mask": "MI", "gloves_left": "HA"}
                },
                {
                    "id": 8,
                    "bbox": {"xmin": 300, "ymin": 300, "xmax": 350, "ymax": 350},
                    "attributes": {"gown": "GP", "mask": "MP"}
                }
            ]
        }
    }"#;

    fn loaded() -> OverlayState {
        let mut state = OverlayState::new();
        state.load_annotations(FRAME_ONE.as_bytes()).unwrap();
        state
    }

    fn key(id: &str, class: ComplianceClass) -> RevealKey {
        RevealKey {
            object: ObjectId(id.into()),
            class,
        }
    }

    fn canvas() -> Viewport {
        Viewport::identity(640.0, 480.0)
    }

    fn origins(rects: impl IntoIterator<Item = Rect>) -> Vec<(f64, f64)> {
        rects.into_iter().map(|r| (r.x, r.y)).collect()
    }

    #[test]
    fn display_modes_are_exclusive() {
        let mut state = OverlayState::new();
        assert_eq!(state.mode(), DisplayMode::Off);
        assert_eq!(state.toggle_all_boxes(), DisplayMode::AllBoxes);
        assert_eq!(state.toggle_alerts(), DisplayMode::Alerts);
        assert_eq!(state.toggle_all_boxes(), DisplayMode::AllBoxes);
        assert_eq!(state.toggle_all_boxes(), DisplayMode::Off);
    }

    #[test]
    fn off_mode_draws_nothing_but_summarizes() {
        let layout = loaded().layout(1, &canvas());
        assert!(layout.boxes.is_empty());
        assert!(layout.alert_icons.is_empty());
        assert_eq!(layout.summary.total, 2);
        assert_eq!(layout.summary.non_compliant, 1);
        assert_eq!(layout.summary.rate, Some(50.0));
    }

    #[test]
    fn all_boxes_uses_class_colors() {
        let mut state = loaded();
        state.toggle_all_boxes();
        let layout = state.layout(1, &canvas());

        assert_eq!(layout.boxes.len(), 2);
        assert_eq!(layout.boxes[0].color, RED);
        assert_eq!(layout.boxes[1].color, WHITE);
        assert!(layout.alert_icons.is_empty());
    }

    #[test]
    fn viewport_scales_and_offsets() {
        let mut state = loaded();
        state.toggle_all_boxes();
        let viewport = Viewport {
            scale_x: 2.0,
            scale_y: 2.0,
            offset_x: 10.0,
            offset_y: 20.0,
            ..canvas()
        };
        let rect = state.layout(1, &viewport).boxes[0].rect;
        assert_eq!(rect, Rect { x: 60.0, y: 70.0, w: 50.0, h: 100.0 });
    }

    #[test]
    fn alert_mode_shows_only_non_compliant() {
        let mut state = loaded();
        state.toggle_alerts();
        let layout = state.layout(1, &canvas());

        assert_eq!(layout.boxes.len(), 1);
        assert_eq!(layout.boxes[0].kind, BoxKind::Alert);
        assert_eq!(origins(layout.alert_icons.iter().map(|i| i.rect)), vec![(86.0, 86.0)]);
        assert!(layout.detail_icons.is_empty());
    }

    #[test]
    fn alert_icon_is_clamped_into_canvas() {
        let rect = Rect { x: 5.0, y: 470.0, w: 10.0, h: 10.0 };
        let icon = alert_icon_rect(&rect, &canvas());
        assert_eq!((icon.x, icon.y), (0.0, 452.0));
    }

    #[test]
    fn revealed_detection_gets_detail_icons_to_the_right() {
        let mut state = loaded();
        state.toggle_alerts();
        state.handle_click(1, &canvas(), 100.0, 100.0);
        let layout = state.layout(1, &canvas());

        assert_eq!(layout.boxes[0].kind, BoxKind::Revealed);
        assert_eq!(
            origins(layout.detail_icons.iter().map(|i| i.rect)),
            vec![(124.0, 86.0), (177.0, 86.0), (230.0, 86.0)]
        );
        let classes: Vec<_> = layout.detail_icons.iter().map(|i| i.class).collect();
        assert_eq!(
            classes,
            vec![
                ComplianceClass::GownAbsent,
                ComplianceClass::MaskImproper,
                ComplianceClass::GlovesAbsent
            ]
        );
    }

    #[test]
    fn detail_icons_fall_back_to_the_left() {
        let rect = Rect { x: 600.0, y: 100.0, w: 30.0, h: 100.0 };
        let icon = alert_icon_rect(&rect, &canvas());
        let placed = detail_icon_rects(&icon, &rect, &canvas(), 1);
        assert_eq!(origins(placed), vec![(548.0, 86.0)]);
    }

    #[test]
    fn detail_icons_go_inside_then_wrap() {
        let viewport = Viewport::identity(60.0, 200.0);
        let rect = Rect { x: 10.0, y: 10.0, w: 40.0, h: 100.0 };
        let icon = alert_icon_rect(&rect, &viewport);
        assert_eq!((icon.x, icon.y), (0.0, 0.0));

        let placed = detail_icon_rects(&icon, &rect, &viewport, 2);
        assert_eq!(origins(placed), vec![(15.0, 15.0), (15.0, 77.0)]);
    }

    #[test]
    fn clicks_toggle_ignore_and_clear() {
        let mut state = loaded();
        state.toggle_alerts();
        let gown = key("7", ComplianceClass::GownAbsent);

        assert_eq!(
            state.handle_click(1, &canvas(), 100.0, 100.0),
            ClickOutcome::Toggled { key: gown.clone(), revealed: true }
        );
        assert!(state.is_revealed(&gown));

        // Inside the box, away from the icon.
        assert_matches!(
            state.handle_click(1, &canvas(), 150.0, 250.0),
            ClickOutcome::Toggled { revealed: false, .. }
        );

        assert_eq!(state.handle_click(1, &canvas(), 320.0, 320.0), ClickOutcome::Ignored);

        state.handle_click(1, &canvas(), 150.0, 250.0);
        assert_eq!(state.handle_click(1, &canvas(), 10.0, 400.0), ClickOutcome::Cleared);
        assert!(!state.is_revealed(&gown));
    }

    #[test]
    fn box_clicks_work_outside_alert_mode() {
        let mut state = loaded();
        assert_matches!(
            state.handle_click(1, &canvas(), 150.0, 250.0),
            ClickOutcome::Toggled { revealed: true, .. }
        );
        assert_eq!(state.revealed_details(1).len(), 1);
        assert_eq!(state.revealed_details(1)[0].1.len(), 3);
    }

    #[test]
    fn malformed_annotations_keep_previous() {
        let mut state = loaded();
        let err = state.load_annotations(b"{not json").unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
        assert!(state.has_annotations());
        assert_eq!(state.detections(2).len(), 2);
    }

    #[test]
    fn frames_without_annotations_are_empty() {
        let state = loaded();
        assert!(state.detections(3).is_empty());
        assert_eq!(state.layout(3, &canvas()).summary.rate, None);
    }
}
