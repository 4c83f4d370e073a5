//! Rotating globe dashboard: braille projection, arc rendering, KPI
//! panel, status line, and the single-threaded frame loop that ties the
//! stream manager, arc engine and aggregation window together.

use crossterm::event::{Event, KeyCode, MouseButton, MouseEvent, MouseEventKind};
use crossterm::style::Color;
use std::io;
use std::time::{Duration, Instant};

use crate::arcs::{sample_arc, ArcLifecycleEngine};
use crate::colors;
use crate::config::{GlobeConfig, STATS_REFRESH};
use crate::demo::DemoFeed;
use crate::geo::{BorderSet, GeoResolver};
use crate::stats::{AggregationWindow, WindowStats};
use crate::stream::{ConnStatus, Dialer, StreamConnectionManager};
use crate::terminal::Terminal;
use crate::view::{ViewState, ViewStateController};

const HELP: &str = "\
NETGLOBE
─────────────────
drag   Pan globe
wheel  Zoom
↑/↓    Tilt
←/→    Pan
+/-    Zoom
0      Reset zoom
space  Pause
?      Toggle help
q      Quit";

/// Dots-per-arc when fully extended.
const ARC_STEPS: i32 = 48;
/// Degrees of camera movement per dragged cell, before damping.
const DRAG_DEG_PER_CELL: f32 = 1.2;
/// A wheel gesture is considered over this long after the last tick.
const ZOOM_GESTURE_HOLD: Duration = Duration::from_millis(300);

// Braille plot classes, low to high priority.
const CLASS_GRATICULE: u8 = 1;
const CLASS_BORDER: u8 = 2;
const CLASS_ARC_DIM: u8 = 3;
const CLASS_ARC: u8 = 4;
const CLASS_HEAD: u8 = 5;

struct BrailleGrid {
    w: usize,
    h: usize,
    class: Vec<Vec<u8>>,
    color: Vec<Vec<Option<(Color, bool)>>>,
}

impl BrailleGrid {
    fn new(cells_w: u16, cells_h: u16) -> Self {
        let w = cells_w as usize * 2;
        let h = cells_h as usize * 4;
        Self {
            w,
            h,
            class: vec![vec![0; w]; h],
            color: vec![vec![None; w]; h],
        }
    }

    fn reset(&mut self) {
        for row in &mut self.class {
            row.fill(0);
        }
        for row in &mut self.color {
            row.fill(None);
        }
    }

    fn plot(&mut self, bx: i32, by: i32, class: u8, color: Color, bold: bool) {
        if bx < 0 || by < 0 || bx >= self.w as i32 || by >= self.h as i32 {
            return;
        }
        let (bx, by) = (bx as usize, by as usize);
        if class > self.class[by][bx] {
            self.class[by][bx] = class;
            self.color[by][bx] = Some((color, bold));
        }
    }

    /// Collapse 2x4 dot blocks into braille characters on the terminal.
    fn blit(&self, term: &mut Terminal) {
        let (cells_w, cells_h) = term.size();
        const DOT_BITS: [u8; 8] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80];
        for cy in 0..cells_h as usize {
            let by = cy * 4;
            if by + 3 >= self.h {
                continue;
            }
            for cx in 0..cells_w as usize {
                let bx = cx * 2;
                if bx + 1 >= self.w {
                    continue;
                }
                let positions = [
                    (by, bx),
                    (by + 1, bx),
                    (by + 2, bx),
                    (by, bx + 1),
                    (by + 1, bx + 1),
                    (by + 2, bx + 1),
                    (by + 3, bx),
                    (by + 3, bx + 1),
                ];
                let mut dots: u8 = 0;
                let mut best_class: u8 = 0;
                let mut best_color: Option<(Color, bool)> = None;
                for (i, &(py, px)) in positions.iter().enumerate() {
                    let class = self.class[py][px];
                    if class > 0 {
                        dots |= DOT_BITS[i];
                        if class > best_class {
                            best_class = class;
                            best_color = self.color[py][px];
                        }
                    }
                }
                if dots > 0 {
                    let ch = char::from_u32(0x2800 + dots as u32).unwrap_or(' ');
                    let (color, bold) = best_color.unwrap_or((colors::GRATICULE, false));
                    term.set(cx as i32, cy as i32, ch, Some(color), bold);
                }
            }
        }
    }
}

/// Orthographic projection of `(lat, lon)` degrees to braille dot
/// coordinates, or None when the point is on the back hemisphere.
struct Projection {
    rotation: f32,
    cos_tilt: f32,
    sin_tilt: f32,
    half_w: f32,
    half_h: f32,
    radius: f32,
}

impl Projection {
    fn new(view: &ViewState, cells_w: u16, cells_h: u16) -> Self {
        let w = cells_w as f32;
        let h = cells_h as f32;
        let tilt = view.latitude.to_radians();
        Self {
            rotation: (view.longitude + view.orbit).to_radians(),
            cos_tilt: tilt.cos(),
            sin_tilt: tilt.sin(),
            half_w: w / 2.0,
            half_h: h / 2.0,
            radius: (h * 1.8).min(w * 0.8) * 0.4 * view.zoom,
        }
    }

    fn project(&self, lat_deg: f32, lon_deg: f32) -> Option<(i32, i32)> {
        let lat = lat_deg.clamp(-89.9, 89.9).to_radians();
        let lon = lon_deg.to_radians();

        let x = lat.cos() * (lon + self.rotation).sin();
        let y = lat.cos() * (lon + self.rotation).cos();
        let z = lat.sin();

        let y2 = y * self.cos_tilt - z * self.sin_tilt;
        let z2 = y * self.sin_tilt + z * self.cos_tilt;

        if y2 < -0.1 {
            return None;
        }

        let screen_x = self.half_w + x * self.radius;
        let screen_y = self.half_h - z2 * self.radius * 0.5;
        Some(((screen_x * 2.0) as i32, (screen_y * 4.0) as i32))
    }
}

/// Run the dashboard until the user quits.
pub fn run<D: Dialer>(
    term: &mut Terminal,
    cfg: &GlobeConfig,
    geo: &GeoResolver,
    borders: &BorderSet,
    mut manager: Option<StreamConnectionManager<D>>,
    mut demo: Option<DemoFeed>,
) -> io::Result<()> {
    let mut engine = ArcLifecycleEngine::new(Default::default(), colors::ARC_PALETTE.len());
    let mut window = AggregationWindow::new(Default::default(), cfg.top_n);
    let mut view = ViewStateController::new(ViewState::default(), Default::default());

    let (init_w, init_h) = term.size();
    let (mut prev_w, mut prev_h) = (init_w, init_h);
    let mut grid = BrailleGrid::new(init_w, init_h);

    let mut paused = false;
    let mut show_help = false;
    let mut last_mouse: Option<(u16, u16)> = None;
    let mut last_zoom_at: Option<Instant> = None;

    let mut stats = WindowStats::default();
    let mut next_stats_at = Instant::now();
    let mut last_frame = Instant::now();

    loop {
        let (width, height) = crossterm::terminal::size().unwrap_or(term.size());
        if width != prev_w || height != prev_h {
            term.resize(width, height);
            term.clear_screen()?;
            prev_w = width;
            prev_h = height;
            grid = BrailleGrid::new(width, height);
        }

        // Drain input.
        while let Some(event) = term.poll_event()? {
            match event {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') => paused = !paused,
                    KeyCode::Char('?') => show_help = !show_help,
                    KeyCode::Up => nudge(&mut view, 3.0, 0.0),
                    KeyCode::Down => nudge(&mut view, -3.0, 0.0),
                    KeyCode::Left => nudge(&mut view, 0.0, 5.0),
                    KeyCode::Right => nudge(&mut view, 0.0, -5.0),
                    KeyCode::Char('+') | KeyCode::Char('=') => zoom_by(&mut view, 1.2),
                    KeyCode::Char('-') | KeyCode::Char('_') => zoom_by(&mut view, 1.0 / 1.2),
                    KeyCode::Char('0') => {
                        let mut proposed = *view.state();
                        proposed.zoom = 1.0;
                        proposed.dragging = false;
                        proposed.zooming = false;
                        view.apply(proposed);
                    }
                    _ => {}
                },
                Event::Mouse(mouse) => {
                    handle_mouse(mouse, &mut view, &mut last_mouse, &mut last_zoom_at)
                }
                _ => {}
            }
        }

        // A wheel gesture has no release event; expire it after a lull.
        if let Some(at) = last_zoom_at {
            if at.elapsed() > ZOOM_GESTURE_HOLD && view.state().zooming {
                let mut release = *view.state();
                release.zooming = false;
                view.apply(release);
                last_zoom_at = None;
            }
        }

        if paused {
            term.sleep(0.1);
            last_frame = Instant::now();
            continue;
        }

        let now = Instant::now();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let dt = now.saturating_duration_since(last_frame).as_secs_f32();
        last_frame = now;

        // Feed events into the engines; live and demo paths are identical
        // past this point.
        if let Some(mgr) = manager.as_mut() {
            mgr.poll(now, &mut |ev| {
                engine.admit(&ev, geo, now);
                window.record(ev.ts_ms, &ev.src_country, ev.intensity);
            });
        }
        if let Some(feed) = demo.as_mut() {
            while let Some(ev) = feed.poll(now) {
                engine.admit(&ev, geo, now);
                window.record(ev.ts_ms, &ev.src_country, ev.intensity);
            }
        }

        // Debounced KPI refresh: bursts collapse into one recompute.
        if now >= next_stats_at {
            stats = window.compute_stats(now_ms);
            next_stats_at = now + STATS_REFRESH;
        }

        view.idle_tick(dt);
        engine.tick(now);

        // Draw.
        grid.reset();
        let proj = Projection::new(view.state(), width, height);
        draw_graticule(&mut grid, &proj);
        draw_borders(&mut grid, &proj, borders);
        draw_arcs(&mut grid, &proj, &engine);

        term.clear();
        grid.blit(term);
        draw_panel(term, &stats, cfg.top_n);
        draw_status(term, height, &engine, manager.as_ref(), cfg.demo);
        if show_help {
            draw_help(term, width, height);
        }
        term.render()?;
        term.sleep(cfg.frame_time);
    }
}

fn nudge(view: &mut ViewStateController, dlat: f32, dlon: f32) {
    let mut proposed = *view.state();
    proposed.latitude += dlat;
    proposed.longitude += dlon;
    proposed.dragging = false;
    proposed.zooming = false;
    view.apply(proposed);
}

fn zoom_by(view: &mut ViewStateController, factor: f32) {
    let mut proposed = *view.state();
    proposed.zoom *= factor;
    proposed.dragging = false;
    proposed.zooming = false;
    view.apply(proposed);
}

fn handle_mouse(
    mouse: MouseEvent,
    view: &mut ViewStateController,
    last_mouse: &mut Option<(u16, u16)>,
    last_zoom_at: &mut Option<Instant>,
) {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            *last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            if let Some((px, py)) = *last_mouse {
                let dx = mouse.column as f32 - px as f32;
                let dy = mouse.row as f32 - py as f32;
                let scale = DRAG_DEG_PER_CELL / view.state().zoom.max(0.1);
                let mut proposed = *view.state();
                proposed.latitude += dy * scale;
                proposed.longitude -= dx * scale;
                proposed.dragging = true;
                proposed.zooming = false;
                view.apply(proposed);
            }
            *last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Up(MouseButton::Left) => {
            *last_mouse = None;
            let mut release = *view.state();
            release.dragging = false;
            view.apply(release);
        }
        MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
            let factor = if mouse.kind == MouseEventKind::ScrollUp {
                1.15
            } else {
                1.0 / 1.15
            };
            let mut proposed = *view.state();
            proposed.zoom *= factor;
            proposed.zooming = true;
            proposed.dragging = false;
            view.apply(proposed);
            *last_zoom_at = Some(Instant::now());
        }
        _ => {}
    }
}

fn draw_graticule(grid: &mut BrailleGrid, proj: &Projection) {
    for lat_deg in (-60..=60).step_by(30) {
        for lon_deg in (0..360).step_by(2) {
            let lon = lon_deg as f32 - 180.0;
            if let Some((bx, by)) = proj.project(lat_deg as f32, lon) {
                grid.plot(bx, by, CLASS_GRATICULE, colors::GRATICULE, false);
            }
        }
    }
    for lon_deg in (0..360).step_by(30) {
        for lat_deg in (-90..=90).step_by(2) {
            let lon = lon_deg as f32 - 180.0;
            if let Some((bx, by)) = proj.project(lat_deg as f32, lon) {
                grid.plot(bx, by, CLASS_GRATICULE, colors::GRATICULE, false);
            }
        }
    }
}

fn draw_borders(grid: &mut BrailleGrid, proj: &Projection, borders: &BorderSet) {
    for line in &borders.polylines {
        for pair in line.windows(2) {
            let (lat1, lon1) = pair[0];
            let (lat2, lon2) = pair[1];
            for t in 0..4 {
                let frac = t as f32 / 4.0;
                let lat = lat1 + (lat2 - lat1) * frac;
                let lon = lon1 + (lon2 - lon1) * frac;
                if let Some((bx, by)) = proj.project(lat, lon) {
                    grid.plot(bx, by, CLASS_BORDER, colors::BORDER, false);
                }
            }
        }
    }
}

fn draw_arcs(grid: &mut BrailleGrid, proj: &Projection, engine: &ArcLifecycleEngine) {
    for arc in engine.iter() {
        let peak = engine.altitude_of(arc);
        let fading = arc.alpha < 1.0;
        let (class, color) = if fading && arc.alpha <= 0.5 {
            (CLASS_ARC_DIM, colors::arc_color_dim(arc.color))
        } else {
            (CLASS_ARC, colors::arc_color(arc.color))
        };
        let thick = arc.width_base > 2.0;

        let head = (arc.progress * ARC_STEPS as f32) as i32;
        for t in 0..=head {
            let frac = t as f32 / ARC_STEPS as f32;
            let (lat, lon, alt) = sample_arc(arc, frac, peak);
            if let Some((bx, by)) = proj.project(lat + alt, lon) {
                let is_head = !fading && t >= head - 2;
                if is_head {
                    grid.plot(bx, by, CLASS_HEAD, colors::arc_color(arc.color), true);
                } else {
                    grid.plot(bx, by, class, color, false);
                }
                if thick {
                    grid.plot(bx, by + 1, class, color, false);
                }
            }
        }

        // Impact pulse at the target while the arc fades out.
        if fading && arc.alpha > 0.0 {
            if let Some((bx, by)) = proj.project(arc.target.0, arc.target.1) {
                let size = (arc.alpha * 2.5) as i32;
                for dy in -size..=size {
                    for dx in -size..=size {
                        if dx.abs() + dy.abs() <= size {
                            grid.plot(bx + dx, by + dy, CLASS_HEAD, colors::arc_color(arc.color), true);
                        }
                    }
                }
            }
        }
    }
}

fn draw_panel(term: &mut Terminal, stats: &WindowStats, top_n: usize) {
    term.set_str(1, 1, "NETGLOBE", Some(colors::PANEL_HEADER), true);
    term.set_str(
        1,
        2,
        &format!("events/min {:>6}", stats.events_last_minute),
        Some(colors::PANEL_TEXT),
        false,
    );
    term.set_str(
        1,
        3,
        &format!("intensity  {:>6.1}", stats.total_intensity),
        Some(colors::PANEL_TEXT),
        false,
    );

    if stats.top_countries.is_empty() {
        return;
    }
    term.set_str(1, 5, "top sources", Some(colors::PANEL_HEADER), false);
    let max_count = stats.top_countries[0].count.max(1);
    for (i, country) in stats.top_countries.iter().take(top_n).enumerate() {
        let bar_len = (country.count * 10 + max_count - 1) / max_count;
        let bar: String = "█".repeat(bar_len.min(10));
        term.set_str(
            1,
            6 + i as i32,
            &format!("{:<3}", country.code),
            Some(colors::PANEL_TEXT),
            false,
        );
        term.set_str(5, 6 + i as i32, &bar, Some(colors::PANEL_BAR), false);
        term.set_str(
            16,
            6 + i as i32,
            &format!("{:>4}", country.count),
            Some(colors::PANEL_TEXT),
            false,
        );
    }
}

fn draw_status<D: Dialer>(
    term: &mut Terminal,
    height: u16,
    engine: &ArcLifecycleEngine,
    manager: Option<&StreamConnectionManager<D>>,
    demo: bool,
) {
    let (label, color) = match manager.map(|m| m.status()) {
        Some(s @ ConnStatus::Connected) => (s.label(), colors::STATUS_OK),
        Some(s @ ConnStatus::Reconnecting) => (s.label(), colors::STATUS_WARN),
        Some(s @ ConnStatus::Unable) => (s.label(), colors::STATUS_ERR),
        Some(ConnStatus::Idle) | None if demo => ("demo feed", colors::STATUS_WARN),
        _ => (ConnStatus::Idle.label(), colors::PANEL_TEXT),
    };
    let endpoint = manager
        .and_then(|m| m.active_url())
        .unwrap_or("");
    let clock = chrono::Local::now().format("%H:%M:%S");
    let line = format!(
        "● {} {} │ arcs {:>3} │ {}",
        label,
        endpoint,
        engine.len(),
        clock
    );
    term.set_str(1, height as i32 - 1, &line, Some(color), false);
}

fn draw_help(term: &mut Terminal, width: u16, height: u16) {
    let lines: Vec<&str> = HELP.lines().collect();
    let box_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    let box_h = lines.len() + 2;
    let x0 = (width as usize).saturating_sub(box_w) / 2;
    let y0 = (height as usize).saturating_sub(box_h) / 2;

    for (i, line) in lines.iter().enumerate() {
        let y = (y0 + 1 + i) as i32;
        let blank = " ".repeat(box_w);
        term.set_str(x0 as i32, y, &blank, None, false);
        term.set_str(x0 as i32 + 2, y, line, Some(colors::PANEL_TEXT), false);
    }
    for x in 0..box_w {
        term.set(
            (x0 + x) as i32,
            y0 as i32,
            if x == 0 { '┌' } else if x == box_w - 1 { '┐' } else { '─' },
            Some(colors::PANEL_HEADER),
            false,
        );
        term.set(
            (x0 + x) as i32,
            (y0 + box_h - 1) as i32,
            if x == 0 { '└' } else if x == box_w - 1 { '┘' } else { '─' },
            Some(colors::PANEL_HEADER),
            false,
        );
    }
    for (i, _) in lines.iter().enumerate() {
        let y = (y0 + 1 + i) as i32;
        term.set(x0 as i32, y, '│', Some(colors::PANEL_HEADER), false);
        term.set((x0 + box_w - 1) as i32, y, '│', Some(colors::PANEL_HEADER), false);
    }
}
