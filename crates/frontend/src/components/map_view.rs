use std::fmt::Write as _;
use std::rc::Rc;

use dioxus::html::geometry::WheelDelta;
use dioxus::html::input_data::MouseButton;
use dioxus::prelude::*;
use serde_json::Value;
use vma_shared::annotation::AnnotationLayer;
use vma_shared::clip::{divider_for, lens_for, ratio_from_pointer, Divider};
use vma_shared::map_state::LayerStore;
use vma_shared::models::{CameraState, LonLat, MapEntry, Story, StoryProgress};

use crate::browser::WindowListener;
use crate::coords::{self, point_distance};
use crate::hooks::{
    use_annotation_revision, use_app_state, use_camera, use_layers, use_library, use_player,
};
use crate::state::AppState;

const MAP_CONTAINER_ID: &str = "archive-map-container";

/// Drag threshold in pixels; movement below this is treated as a click.
const DRAG_THRESHOLD: f64 = 3.0;

/// Touch drag threshold, larger than mouse because touch is less precise.
const TOUCH_DRAG_THRESHOLD: f64 = 8.0;

/// Screen distance within which a right-click removes an annotation pin.
const REMOVE_THRESHOLD: f64 = 16.0;

/// Target spacing of graticule lines in pixels.
const GRATICULE_SPACING_PX: f64 = 120.0;
const GRATICULE_MAX_LINES: usize = 200;

/// What a click on the map does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapTool {
    #[default]
    Browse,
    Annotate,
    StoryPoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Pan {
        origin: (f64, f64),
        last: (f64, f64),
        moved: bool,
    },
    Divider,
    Lens,
}

#[derive(Debug, Clone, PartialEq)]
struct Pinch {
    start_distance: f64,
    midpoint: (f64, f64),
    camera: CameraState,
}

pub fn overlay_image_url(map_id: &str) -> String {
    format!("/static/images/maps/{map_id}.webp")
}

// ---------------------------------------------------------------------------
// DOM helpers
// ---------------------------------------------------------------------------

fn container_rect() -> Option<web_sys::DomRect> {
    let document = web_sys::window()?.document()?;
    let element = document.get_element_by_id(MAP_CONTAINER_ID)?;
    Some(element.get_bounding_client_rect())
}

/// Container-relative position of a client point.
fn to_container(client_x: f64, client_y: f64) -> Option<(f64, f64)> {
    let rect = container_rect()?;
    Some(coords::client_to_container(client_x, client_y, rect.left(), rect.top()))
}

fn sync_viewport(layers: &LayerStore, mut viewport: Signal<(f64, f64)>) {
    let Some(rect) = container_rect() else { return };
    let size = (rect.width(), rect.height());
    if *viewport.peek() != size {
        viewport.set(size);
    }
    layers.set_viewport(size.0, size.1);
}

/// Convert a wheel delta (pixels / lines / pages) to a uniform pixel-like value.
fn wheel_delta_y(delta: WheelDelta) -> f64 {
    match delta {
        WheelDelta::Pixels(d) => d.y,
        WheelDelta::Lines(d) => d.y * 40.0,
        WheelDelta::Pages(d) => d.y * 400.0,
    }
}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    Pending,
    Current,
    Completed,
}

/// Screen-space primitive drawn over the map.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Pin {
        id: String,
        x: f64,
        y: f64,
        color: String,
        label: String,
    },
    Path {
        points: Vec<(f64, f64)>,
        closed: bool,
        color: String,
    },
    Stop {
        x: f64,
        y: f64,
        number: usize,
        ring: f64,
        status: StopStatus,
    },
    Position {
        x: f64,
        y: f64,
    },
}

fn parse_lonlat(value: &Value) -> Option<LonLat> {
    let pair = value.as_array()?;
    let lon = pair.first()?.as_f64()?;
    let lat = pair.get(1)?.as_f64()?;
    Some([lon, lat])
}

fn parse_line(value: &Value) -> Vec<LonLat> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(parse_lonlat).collect())
        .unwrap_or_default()
}

/// Pins for points, paths for lines and polygon outer rings. Hidden
/// features and unsupported geometry types are skipped.
pub fn annotation_shapes(layer: &AnnotationLayer, project: impl Fn(LonLat) -> (f64, f64)) -> Vec<Shape> {
    let mut shapes = Vec::new();
    for feature in layer.features().iter().filter(|f| !f.hidden) {
        let coordinates = feature.geometry.get("coordinates").unwrap_or(&Value::Null);
        match feature.geometry_type() {
            "Point" => {
                if let Some(p) = parse_lonlat(coordinates) {
                    let (x, y) = project(p);
                    shapes.push(Shape::Pin {
                        id: feature.id.clone(),
                        x,
                        y,
                        color: feature.color.clone(),
                        label: feature.label.clone(),
                    });
                }
            }
            "LineString" | "Polygon" => {
                let closed = feature.geometry_type() == "Polygon";
                let ring = if closed {
                    coordinates.get(0).map(parse_line).unwrap_or_default()
                } else {
                    parse_line(coordinates)
                };
                if ring.len() >= 2 {
                    shapes.push(Shape::Path {
                        points: ring.into_iter().map(&project).collect(),
                        closed,
                        color: feature.color.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    shapes
}

/// Numbered stops with their trigger circles scaled to the current zoom.
pub fn story_shapes(
    story: &Story,
    progress: Option<&StoryProgress>,
    meters_per_px: f64,
    project: impl Fn(LonLat) -> (f64, f64),
) -> Vec<Shape> {
    story
        .points
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let status = match progress {
                Some(p) if p.completed_point_ids.contains(&point.id) => StopStatus::Completed,
                Some(p) if !p.is_finished() && p.current_point_index == i => StopStatus::Current,
                _ => StopStatus::Pending,
            };
            let (x, y) = project(point.coordinates);
            Shape::Stop {
                x,
                y,
                number: i + 1,
                ring: if meters_per_px > 0.0 {
                    point.trigger_radius / meters_per_px
                } else {
                    0.0
                },
                status,
            }
        })
        .collect()
}

/// Id of the pin nearest to `click` within `threshold` pixels.
fn find_nearest_pin(shapes: &[Shape], click: (f64, f64), threshold: f64) -> Option<String> {
    let mut best = None;
    let mut best_dist = threshold;
    for shape in shapes {
        if let Shape::Pin { id, x, y, .. } = shape {
            let d = point_distance((*x, *y), click);
            if d < best_dist {
                best_dist = d;
                best = Some(id.clone());
            }
        }
    }
    best
}

// ---------------------------------------------------------------------------
// SVG builder
// ---------------------------------------------------------------------------

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Accept `#rgb`/`#rrggbb` colors only; anything else falls back.
fn safe_color(color: &str) -> &str {
    let hex = color.strip_prefix('#').unwrap_or("");
    if (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        color
    } else {
        vma_shared::annotation::DEFAULT_ANNOTATION_COLOR
    }
}

/// 1-2-5 step at least as large as `raw`.
fn nice_step(raw: f64) -> f64 {
    if !(raw.is_finite() && raw > 0.0) {
        return 1.0;
    }
    let exp = 10f64.powf(raw.log10().floor());
    let f = raw / exp;
    let nice = if f <= 1.0 {
        1.0
    } else if f <= 2.0 {
        2.0
    } else if f <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * exp
}

/// Graticule standing in for the basemap.
fn build_graticule(svg: &mut String, camera: &CameraState, width: f64, height: f64) {
    let corners = [
        coords::unproject(camera, 0.0, 0.0, width, height),
        coords::unproject(camera, width, 0.0, width, height),
        coords::unproject(camera, 0.0, height, width, height),
        coords::unproject(camera, width, height, width, height),
    ];
    let (mut min_lon, mut min_lat) = (f64::MAX, f64::MAX);
    let (mut max_lon, mut max_lat) = (f64::MIN, f64::MIN);
    for [lon, lat] in corners {
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
    }
    let degrees_per_px = 360.0 / (coords::TILE_SIZE * 2f64.powf(camera.zoom));
    let step = nice_step(GRATICULE_SPACING_PX * degrees_per_px);

    let mut line = |a: LonLat, b: LonLat| {
        let (x0, y0) = coords::project(camera, a, width, height);
        let (x1, y1) = coords::project(camera, b, width, height);
        let _ = write!(
            svg,
            r#"<line x1="{x0:.1}" y1="{y0:.1}" x2="{x1:.1}" y2="{y1:.1}" class="graticule"/>"#
        );
    };
    let mut lon = (min_lon / step).floor() * step;
    let mut count = 0;
    while lon <= max_lon && count < GRATICULE_MAX_LINES {
        line([lon, min_lat], [lon, max_lat]);
        lon += step;
        count += 1;
    }
    let mut lat = (min_lat / step).floor() * step;
    while lat <= max_lat && count < GRATICULE_MAX_LINES {
        line([min_lon, lat], [max_lon, lat]);
        lat += step;
        count += 1;
    }
}

fn build_shapes(svg: &mut String, shapes: &[Shape]) {
    for shape in shapes {
        match shape {
            Shape::Path {
                points,
                closed,
                color,
            } => {
                let pts: Vec<String> = points.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect();
                let tag = if *closed { "polygon" } else { "polyline" };
                let color = safe_color(color);
                let fill = if *closed { color } else { "none" };
                let _ = write!(
                    svg,
                    r#"<{tag} points="{}" stroke="{color}" fill="{fill}" fill-opacity="0.2" stroke-width="2"/>"#,
                    pts.join(" ")
                );
            }
            Shape::Pin {
                x, y, color, label, ..
            } => {
                let color = safe_color(color);
                let _ = write!(
                    svg,
                    r##"<circle cx="{x:.1}" cy="{y:.1}" r="6" fill="{color}" stroke="#fff" stroke-width="2"/><text x="{:.1}" y="{:.1}" class="pin-label">{}</text>"##,
                    x + 9.0,
                    y + 4.0,
                    escape_xml(label)
                );
            }
            Shape::Stop {
                x,
                y,
                number,
                ring,
                status,
            } => {
                let class = match status {
                    StopStatus::Pending => "stop",
                    StopStatus::Current => "stop stop-current",
                    StopStatus::Completed => "stop stop-done",
                };
                if *ring >= 1.0 {
                    let _ = write!(svg, r#"<circle cx="{x:.1}" cy="{y:.1}" r="{ring:.1}" class="stop-ring"/>"#);
                }
                let _ = write!(
                    svg,
                    r#"<g class="{class}"><circle cx="{x:.1}" cy="{y:.1}" r="11"/><text x="{x:.1}" y="{:.1}" text-anchor="middle">{number}</text></g>"#,
                    y + 4.0
                );
            }
            Shape::Position { x, y } => {
                let _ = write!(
                    svg,
                    r#"<circle cx="{x:.1}" cy="{y:.1}" r="8" class="position"/>"#
                );
            }
        }
    }
}

fn build_svg(camera: &CameraState, shapes: &[Shape], width: f64, height: f64) -> String {
    let mut svg = String::with_capacity(4096);
    build_graticule(&mut svg, camera, width, height);
    build_shapes(&mut svg, shapes);
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" style="position:absolute;top:0;left:0;pointer-events:none;">{svg}</svg>"#
    )
}

// ---------------------------------------------------------------------------
// Interaction
// ---------------------------------------------------------------------------

fn handle_click(state: &AppState, tool: MapTool, story_id: Option<&str>, camera: &CameraState, at: (f64, f64), size: (f64, f64)) {
    let lonlat = coords::unproject(camera, at.0, at.1, size.0, size.1);
    match tool {
        MapTool::Browse => {}
        MapTool::Annotate => {
            state.annotations.add_point(lonlat, "Marker");
        }
        MapTool::StoryPoint => match story_id {
            Some(id) => {
                state.library.add_point(id, lonlat);
            }
            None => {
                state.notices.add_info("Select a story before adding points");
            }
        },
    }
}

fn handle_drag_move(state: &AppState, drag: Drag, at: (f64, f64), size: (f64, f64)) -> Drag {
    match drag {
        Drag::Pan { origin, last, moved } => {
            let moved = moved || point_distance(origin, at) > DRAG_THRESHOLD;
            if !moved {
                return drag;
            }
            let camera = state.camera.get();
            state
                .camera
                .set_view(coords::pan_camera(&camera, at.0 - last.0, at.1 - last.1));
            Drag::Pan {
                origin,
                last: at,
                moved,
            }
        }
        Drag::Divider => {
            let mode = state.layers.view_mode().mode;
            if let Some(ratio) = ratio_from_pointer(mode, at.0, at.1, size.0, size.1) {
                state.layers.set_side_ratio(ratio);
            }
            drag
        }
        Drag::Lens => {
            let radius = point_distance(at, (size.0 / 2.0, size.1 / 2.0));
            state.layers.set_lens_radius(radius);
            drag
        }
    }
}

#[component]
pub fn MapView(
    maps: Vec<MapEntry>,
    tool: Signal<MapTool>,
    story_id: Option<String>,
    position: Option<LonLat>,
) -> Element {
    let state = use_app_state();
    let camera = use_camera(&state);
    let layers = use_layers(&state);
    let library = use_library(&state);
    let player = use_player(&state);
    let revision = use_annotation_revision(&state);
    let viewport = use_signal(|| (0.0_f64, 0.0_f64));

    let mut drag = use_signal(|| None::<Drag>);
    let mut touch = use_signal(|| None::<Drag>);
    let mut pinch = use_signal(|| None::<Pinch>);

    use_hook({
        let layers = state.layers.clone();
        move || {
            Rc::new(WindowListener::new("resize", move |_| {
                sync_viewport(&layers, viewport);
            }))
        }
    });

    let cam = camera.read().clone();
    let prefs = layers.read().clone();
    let (width, height) = *viewport.read();
    let _ = *revision.read();

    let project = |p: LonLat| coords::project(&cam, p, width, height);
    let mut shapes = annotation_shapes(&state.annotations.layer(), project);
    let pins = shapes.clone();
    if let Some(id) = &story_id {
        let lib = library.read();
        if let Some(story) = lib.stories.iter().find(|s| &s.id == id) {
            let progress = player.read().progress.get(id).cloned();
            let mpp = coords::meters_per_pixel(cam.latitude, cam.zoom);
            shapes.extend(story_shapes(story, progress.as_ref(), mpp, project));
        }
    }
    if let Some(p) = position {
        let (x, y) = project(p);
        shapes.push(Shape::Position { x, y });
    }
    let svg_html = if width > 0.0 && height > 0.0 {
        build_svg(&cam, &shapes, width, height)
    } else {
        String::new()
    };

    // Overlay layer: clip applies in screen space, rotation inside it
    let overlay = cam
        .active_overlay_id
        .as_ref()
        .filter(|_| prefs.overlay_visible)
        .and_then(|id| maps.iter().find(|m| &m.id == id))
        .map(|entry| {
            let placement = entry
                .bounds
                .and_then(|b| coords::bounds_rect(&cam, b, width, height))
                .map(|(l, t, w, h)| format!("left:{l}px;top:{t}px;width:{w}px;height:{h}px;"))
                .unwrap_or_else(|| "left:0;top:0;width:100%;height:100%;object-fit:cover;".to_string());
            (overlay_image_url(&entry.id), entry.name.clone(), placement)
        });
    let clip_css = state.layers.clip_region().to_css();
    let overlay_style = format!(
        "opacity:{};{}",
        prefs.view.opacity,
        if clip_css.is_empty() {
            String::new()
        } else {
            format!("clip-path:{clip_css};")
        }
    );
    let rotate_style = format!(
        "transform:rotate({}rad);transform-origin:{}px {}px;",
        cam.rotation,
        width / 2.0,
        height / 2.0
    );

    let divider = divider_for(prefs.view.mode, width, height, prefs.view.side_ratio);
    let divider_node = match divider {
        Divider::Vertical { x, height } => rsx! {
            div {
                class: "divider divider-vertical",
                style: "left:{x}px;height:{height}px;",
                onmousedown: move |evt: Event<MouseData>| {
                    evt.stop_propagation();
                    drag.set(Some(Drag::Divider));
                },
            }
        },
        Divider::Horizontal { y, width } => rsx! {
            div {
                class: "divider divider-horizontal",
                style: "top:{y}px;width:{width}px;",
                onmousedown: move |evt: Event<MouseData>| {
                    evt.stop_propagation();
                    drag.set(Some(Drag::Divider));
                },
            }
        },
        Divider::Hidden => rsx! {},
    };
    let lens = lens_for(prefs.view.mode, width, height, prefs.view.lens_radius);
    let readout = coords::format_lonlat([cam.longitude, cam.latitude]);
    let zoom_label = format!("{:.2}", cam.zoom);
    let basemap = prefs.basemap.clone();

    let container_class = match (*drag.read(), *tool.read()) {
        (Some(_), _) => "map-container dragging",
        (None, MapTool::Browse) => "map-container",
        (None, _) => "map-container placing",
    };

    let st_mounted = state.clone();
    let st_wheel = state.clone();
    let st_move = state.clone();
    let st_up = state.clone();
    let st_ctx = state.clone();
    let st_dbl = state.clone();
    let st_tstart = state.clone();
    let st_tmove = state.clone();
    let st_tend = state.clone();
    let story_for_click = story_id.clone();
    let story_for_tap = story_id.clone();

    rsx! {
        div {
            id: MAP_CONTAINER_ID,
            class: "{container_class}",
            "data-basemap": "{basemap}",

            onmounted: move |_| sync_viewport(&st_mounted.layers, viewport),

            onwheel: move |evt: Event<WheelData>| {
                evt.prevent_default();
                let cam = st_wheel.camera.get();
                let new_zoom = coords::wheel_zoom(cam.zoom, wheel_delta_y(evt.data().delta()));
                if (new_zoom - cam.zoom).abs() < 1e-9 {
                    return;
                }
                let client = evt.data().client_coordinates();
                let Some(at) = to_container(client.x, client.y) else { return };
                let (w, h) = *viewport.peek();
                st_wheel.camera.set_view(coords::zoom_at_cursor(&cam, at, w, h, new_zoom));
            },

            onmousedown: move |evt: Event<MouseData>| {
                if evt.trigger_button() != Some(MouseButton::Primary) {
                    return;
                }
                let client = evt.client_coordinates();
                if let Some(at) = to_container(client.x, client.y) {
                    drag.set(Some(Drag::Pan { origin: at, last: at, moved: false }));
                }
            },

            onmousemove: move |evt: Event<MouseData>| {
                let Some(current) = *drag.peek() else { return };
                let client = evt.client_coordinates();
                let Some(at) = to_container(client.x, client.y) else { return };
                let next = handle_drag_move(&st_move, current, at, *viewport.peek());
                if next != current {
                    drag.set(Some(next));
                }
            },

            onmouseup: move |evt: Event<MouseData>| {
                let finished = *drag.peek();
                drag.set(None);
                if let Some(Drag::Pan { moved: false, .. }) = finished {
                    let client = evt.client_coordinates();
                    if let Some(at) = to_container(client.x, client.y) {
                        let cam = st_up.camera.get();
                        handle_click(&st_up, *tool.peek(), story_for_click.as_deref(), &cam, at, *viewport.peek());
                    }
                }
            },

            onmouseleave: move |_| {
                drag.set(None);
            },

            oncontextmenu: move |evt: Event<MouseData>| {
                evt.prevent_default();
                let client = evt.client_coordinates();
                let Some(at) = to_container(client.x, client.y) else { return };
                if let Some(id) = find_nearest_pin(&pins, at, REMOVE_THRESHOLD) {
                    st_ctx.annotations.remove(&id);
                }
            },

            ondoubleclick: move |evt: Event<MouseData>| {
                evt.prevent_default();
                let client = evt.client_coordinates();
                let Some(at) = to_container(client.x, client.y) else { return };
                let cam = st_dbl.camera.get();
                let (w, h) = *viewport.peek();
                st_dbl.camera.set_view(coords::zoom_at_cursor(&cam, at, w, h, cam.zoom + 1.0));
            },

            // --- Touch event handlers ---

            ontouchstart: move |evt: Event<TouchData>| {
                evt.prevent_default();
                let touches = evt.data().touches();
                if touches.len() == 1 {
                    let c = touches[0].client_coordinates();
                    if let Some(at) = to_container(c.x, c.y) {
                        touch.set(Some(Drag::Pan { origin: at, last: at, moved: false }));
                    }
                } else if touches.len() >= 2 {
                    let c0 = touches[0].client_coordinates();
                    let c1 = touches[1].client_coordinates();
                    let (Some(p0), Some(p1)) = (to_container(c0.x, c0.y), to_container(c1.x, c1.y)) else {
                        return;
                    };
                    pinch.set(Some(Pinch {
                        start_distance: point_distance(p0, p1),
                        midpoint: ((p0.0 + p1.0) / 2.0, (p0.1 + p1.1) / 2.0),
                        camera: st_tstart.camera.get(),
                    }));
                    touch.set(None);
                }
            },

            ontouchmove: move |evt: Event<TouchData>| {
                evt.prevent_default();
                let touches = evt.data().touches();
                let (w, h) = *viewport.peek();
                if let Some(start) = pinch.peek().clone() {
                    if touches.len() < 2 {
                        return;
                    }
                    let c0 = touches[0].client_coordinates();
                    let c1 = touches[1].client_coordinates();
                    let (Some(p0), Some(p1)) = (to_container(c0.x, c0.y), to_container(c1.x, c1.y)) else {
                        return;
                    };
                    let zoom = coords::pinch_zoom(start.camera.zoom, start.start_distance, point_distance(p0, p1));
                    st_tmove
                        .camera
                        .set_view(coords::zoom_at_cursor(&start.camera, start.midpoint, w, h, zoom));
                } else if touches.len() == 1 {
                    let Some(Drag::Pan { origin, last, moved }) = *touch.peek() else { return };
                    let c = touches[0].client_coordinates();
                    let Some(at) = to_container(c.x, c.y) else { return };
                    let moved = moved || point_distance(origin, at) > TOUCH_DRAG_THRESHOLD;
                    if moved {
                        let cam = st_tmove.camera.get();
                        st_tmove.camera.set_view(coords::pan_camera(&cam, at.0 - last.0, at.1 - last.1));
                        touch.set(Some(Drag::Pan { origin, last: at, moved }));
                    }
                }
            },

            ontouchend: move |evt: Event<TouchData>| {
                evt.prevent_default();
                let remaining = evt.data().touches().len();
                if pinch.peek().is_some() {
                    if remaining == 0 {
                        pinch.set(None);
                    }
                    return;
                }
                if remaining == 0 {
                    if let Some(Drag::Pan { origin, moved: false, .. }) = *touch.peek() {
                        let cam = st_tend.camera.get();
                        handle_click(&st_tend, *tool.peek(), story_for_tap.as_deref(), &cam, origin, *viewport.peek());
                    }
                    touch.set(None);
                }
            },

            ontouchcancel: move |_evt: Event<TouchData>| {
                touch.set(None);
                pinch.set(None);
            },

            div { class: "basemap basemap-{basemap}" }

            if let Some((src, alt, placement)) = overlay {
                div { class: "overlay-layer", style: "{overlay_style}",
                    div { class: "overlay-rotate", style: "{rotate_style}",
                        img {
                            src: "{src}",
                            alt: "{alt}",
                            draggable: "false",
                            style: "position:absolute;{placement}",
                        }
                    }
                }
            }

            div {
                class: "map-shapes",
                dangerous_inner_html: "{svg_html}",
            }

            {divider_node}

            if let Some(lens) = lens {
                div {
                    class: "lens",
                    style: "left:{lens.x}px;top:{lens.y}px;width:{lens.diameter}px;height:{lens.diameter}px;",
                }
                div {
                    class: "lens-handle",
                    style: "left:{lens.handle_x}px;top:{lens.handle_y}px;",
                    onmousedown: move |evt: Event<MouseData>| {
                        evt.stop_propagation();
                        drag.set(Some(Drag::Lens));
                    },
                }
            }

            div { class: "coord-readout",
                span { class: "coord-tag", "{readout}" }
                span { class: "coord-tag", "z {zoom_label}" }
            }
        }
    }
}
