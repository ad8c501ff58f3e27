use crate::hardware::{DisplayConfiguration, HardwareError, OutputConfiguration};
use crate::screen::{FormFactor, Mode, OutputId, Point, PowerMode, Resolution};
use std::collections::HashMap;
use x11rb::CURRENT_TIME;
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;

type Modes<'a> = HashMap<randr::Mode, &'a randr::ModeInfo>;
type Outputs = HashMap<randr::Output, randr::GetOutputInfoReply>;
type Crtcs = HashMap<randr::Crtc, randr::GetCrtcInfoReply>;

fn connect() -> Result<(RustConnection, xproto::Window), HardwareError> {
    let (conn, screen_num) = RustConnection::connect(None)?;
    let root = conn
        .setup()
        .roots
        .get(screen_num)
        .map(|screen| screen.root)
        .ok_or_else(|| HardwareError::Unsupported(format!("X11 screen {screen_num} is missing")))?;
    Ok((conn, root))
}

fn query_outputs(
    conn: &RustConnection,
    screen_resources: &randr::GetScreenResourcesReply,
) -> Result<Vec<(randr::Output, randr::GetOutputInfoReply)>, HardwareError> {
    screen_resources
        .outputs
        .iter()
        .map(|&output_id| -> Result<_, HardwareError> {
            let output = conn
                .randr_get_output_info(output_id, screen_resources.config_timestamp)?
                .reply()?;
            log::trace!("output = {output:?}");
            Ok((output_id, output))
        })
        .collect()
}

fn query_crtcs(
    conn: &RustConnection,
    screen_resources: &randr::GetScreenResourcesReply,
) -> Result<Crtcs, HardwareError> {
    screen_resources
        .crtcs
        .iter()
        .map(|&crtc_id| -> Result<_, HardwareError> {
            let crtc = conn
                .randr_get_crtc_info(crtc_id, screen_resources.config_timestamp)?
                .reply()?;
            Ok((crtc_id, crtc))
        })
        .collect()
}

fn query_edid(
    conn: &RustConnection,
    output_id: randr::Output,
    edid_atom: xproto::Atom,
) -> Result<Option<Vec<u8>>, HardwareError> {
    if edid_atom == x11rb::NONE {
        return Ok(None);
    }
    let property = conn
        .randr_get_output_property(
            output_id,
            edid_atom,
            x11rb::NONE,
            0,
            u32::MAX,
            false,
            false,
        )?
        .reply()?;
    Ok((property.format == 8 && !property.data.is_empty()).then_some(property.data))
}

fn mode_map(screen_resources: &randr::GetScreenResourcesReply) -> Modes<'_> {
    screen_resources
        .modes
        .iter()
        .map(|mode| (mode.id, mode))
        .collect()
}

pub(super) fn read_configuration() -> Result<DisplayConfiguration, HardwareError> {
    let (conn, root) = connect()?;
    let screen_resources = conn.randr_get_screen_resources(root)?.reply()?;
    log::trace!("screen_resources = {screen_resources:?}");

    let modes = mode_map(&screen_resources);
    let crtcs = query_crtcs(&conn, &screen_resources)?;
    let edid_atom = conn.intern_atom(true, b"EDID")?.reply()?.atom;

    let outputs = query_outputs(&conn, &screen_resources)?
        .into_iter()
        .map(|(output_id, output)| {
            let edid = query_edid(&conn, output_id, edid_atom)?;
            randr_output_into_configuration(&output, &modes, &crtcs, edid)
        })
        .collect::<Result<_, _>>()?;

    Ok(DisplayConfiguration { outputs })
}

fn randr_output_into_configuration(
    output: &randr::GetOutputInfoReply,
    modes: &Modes,
    crtcs: &Crtcs,
    edid: Option<Vec<u8>>,
) -> Result<OutputConfiguration, HardwareError> {
    let mode_ids = admissible_mode_ids(output, modes)?;
    let crtc = crtcs.get(&output.crtc).filter(|crtc| crtc.mode != 0);

    Ok(OutputConfiguration {
        id: OutputId::new(String::from_utf8_lossy(&output.name)),
        connected: output.connection == randr::Connection::CONNECTED,
        used: crtc.is_some(),
        top_left: crtc.map_or_else(Point::default, |crtc| Point {
            x: crtc.x.into(),
            y: crtc.y.into(),
        }),
        current_mode_index: crtc
            .and_then(|crtc| mode_ids.iter().position(|&mode_id| mode_id == crtc.mode))
            .unwrap_or(0),
        modes: mode_ids
            .iter()
            .filter_map(|mode_id| modes.get(mode_id))
            .map(|mode| randr_mode_to_mode(mode))
            .collect(),
        power_mode: PowerMode::On,
        scale: 1.0,
        form_factor: FormFactor::Monitor,
        physical_size_mm: (output.mm_width, output.mm_height),
        edid,
    })
}

/// Mode ids in the order their index is exposed to the model.
fn admissible_mode_ids(
    output: &randr::GetOutputInfoReply,
    modes: &Modes,
) -> Result<Vec<randr::Mode>, HardwareError> {
    let mut mode_ids = Vec::with_capacity(output.modes.len());
    for mode_id in &output.modes {
        let mode = modes.get(mode_id).ok_or_else(|| HardwareError::Parse {
            what: "randr screen resources",
            reason: format!("unknown mode id {mode_id}"),
        })?;
        if is_admissible(mode) {
            mode_ids.push(*mode_id);
        }
    }
    Ok(mode_ids)
}

fn is_admissible(mode: &randr::ModeInfo) -> bool {
    !mode.mode_flags.contains(randr::ModeFlag::DOUBLE_SCAN)
}

fn randr_mode_to_mode(mode: &randr::ModeInfo) -> Mode {
    Mode {
        resolution: Resolution {
            width: mode.width.into(),
            height: mode.height.into(),
        },
        refresh_rate_millihz: compute_refresh_rate(mode),
    }
}

fn compute_refresh_rate(mode: &randr::ModeInfo) -> u32 {
    if mode.htotal > 0 && mode.vtotal > 0 {
        let rate = u64::from(mode.dot_clock) * 1000
            / (u64::from(mode.htotal) * u64::from(mode.vtotal));
        u32::try_from(rate).unwrap_or(u32::MAX)
    } else {
        0
    }
}

/// RandR only places modes; any other requested setting is refused.
fn check_supported(configuration: &DisplayConfiguration) -> Result<(), HardwareError> {
    for output in configuration.outputs.iter().filter(|output| output.used) {
        if output.scale != 1.0 {
            return Err(HardwareError::Unsupported(format!(
                "randr cannot scale {} by {}",
                output.id, output.scale
            )));
        }
        if output.power_mode != PowerMode::On {
            return Err(HardwareError::Unsupported(format!(
                "randr cannot set power mode {:?} of {}",
                output.power_mode, output.id
            )));
        }
        if output.form_factor != FormFactor::Monitor {
            return Err(HardwareError::Unsupported(format!(
                "randr cannot set form factor {:?} of {}",
                output.form_factor, output.id
            )));
        }
    }
    Ok(())
}

pub(super) fn submit_configuration(
    configuration: &DisplayConfiguration,
) -> Result<(), HardwareError> {
    check_supported(configuration)?;

    let (conn, root) = connect()?;
    let screen_resources = conn.randr_get_screen_resources(root)?.reply()?;
    let timestamp = screen_resources.config_timestamp;

    let modes = mode_map(&screen_resources);
    let outputs: Outputs = query_outputs(&conn, &screen_resources)?
        .into_iter()
        .collect();
    let old_crtcs = query_crtcs(&conn, &screen_resources)?;

    let mut crtcs = old_crtcs.clone();
    update_crtcs(configuration, &modes, &outputs, &mut crtcs)?;
    normalize_origin(&modes, &mut crtcs)?;

    let changed: Vec<_> = crtcs
        .iter()
        .filter(|(crtc_id, crtc)| {
            old_crtcs
                .get(crtc_id)
                .is_none_or(|old| !same_crtc_config(old, crtc))
        })
        .map(|(&crtc_id, crtc)| (crtc_id, crtc))
        .collect();

    // A changed CRTC may not fit the new screen size until it is reconfigured.
    for &(crtc_id, _) in &changed {
        if old_crtcs.get(&crtc_id).is_some_and(|old| old.mode != 0) {
            log::trace!("disabling crtc_id = {crtc_id}");
            conn.randr_set_crtc_config(
                crtc_id,
                CURRENT_TIME,
                timestamp,
                0,
                0,
                x11rb::NONE,
                randr::Rotation::ROTATE0,
                &[],
            )?
            .reply()?;
        }
    }

    if let Some(screen_size) = compute_screen_size(&modes, &outputs, &crtcs)? {
        log::trace!("screen_size = {screen_size:?}");
        conn.randr_set_screen_size(
            root,
            screen_size.width,
            screen_size.height,
            screen_size.mm_width,
            screen_size.mm_height,
        )?
        .check()?;
    }

    for (crtc_id, crtc_config) in changed {
        if crtc_config.mode == 0 {
            continue;
        }
        log::trace!("crtc_id = {crtc_id} crtc_config = {crtc_config:?}");
        conn.randr_set_crtc_config(
            crtc_id,
            CURRENT_TIME,
            timestamp,
            crtc_config.x,
            crtc_config.y,
            crtc_config.mode,
            crtc_config.rotation,
            &crtc_config.outputs,
        )?
        .reply()?;
    }

    Ok(())
}

fn same_crtc_config(a: &randr::GetCrtcInfoReply, b: &randr::GetCrtcInfoReply) -> bool {
    a.x == b.x && a.y == b.y && a.mode == b.mode && a.rotation == b.rotation && a.outputs == b.outputs
}

fn output_name(output: &randr::GetOutputInfoReply) -> OutputId {
    OutputId::new(String::from_utf8_lossy(&output.name))
}

fn update_crtcs(
    configuration: &DisplayConfiguration,
    modes: &Modes,
    outputs: &Outputs,
    crtcs: &mut Crtcs,
) -> Result<(), HardwareError> {
    let requested = |output: &randr::GetOutputInfoReply| configuration.output(&output_name(output));

    // Release CRTCs first so they can be reused below.
    for (output_id, output) in outputs {
        if requested(output).is_none_or(|requested| requested.used) || output.crtc == 0 {
            continue;
        }
        if let Some(crtc) = crtcs.get_mut(&output.crtc) {
            crtc.outputs.retain(|id| id != output_id);
            if crtc.outputs.is_empty() {
                crtc.mode = 0;
            }
        }
    }

    for (output_id, output) in outputs {
        let Some(requested) = requested(output).filter(|requested| requested.used) else {
            continue;
        };

        let mode_id = admissible_mode_ids(output, modes)?
            .get(requested.current_mode_index)
            .copied()
            .ok_or_else(|| {
                HardwareError::Unsupported(format!(
                    "{} has no mode #{}",
                    requested.id, requested.current_mode_index
                ))
            })?;

        let crtc_id = if crtcs
            .get(&output.crtc)
            .is_some_and(|crtc| crtc.outputs.contains(output_id))
        {
            output.crtc
        } else {
            output
                .crtcs
                .iter()
                .copied()
                .find(|crtc_id| {
                    crtcs
                        .get(crtc_id)
                        .is_some_and(|crtc_config| crtc_config.outputs.is_empty())
                })
                .ok_or_else(|| {
                    HardwareError::Unsupported(format!("no free CRTC for {}", requested.id))
                })?
        };

        let crtc = crtcs.get_mut(&crtc_id).ok_or_else(|| HardwareError::Parse {
            what: "randr screen resources",
            reason: format!("unknown crtc id {crtc_id}"),
        })?;
        if !crtc.outputs.contains(output_id) {
            crtc.outputs.push(*output_id);
        }

        let coordinate = |value: i32| {
            i16::try_from(value).map_err(|_| {
                HardwareError::Unsupported(format!("{} position {value} is out of range", requested.id))
            })
        };
        crtc.x = coordinate(requested.top_left.x)?;
        crtc.y = coordinate(requested.top_left.y)?;
        crtc.mode = mode_id;
        crtc.rotation = randr::Rotation::ROTATE0;
    }

    Ok(())
}

/// X11 screens start at the origin, so negative positions shift everything.
fn normalize_origin(modes: &Modes, crtcs: &mut Crtcs) -> Result<(), HardwareError> {
    let enabled = || crtcs.values().filter(|crtc| crtc.mode != 0);
    let (Some(min_x), Some(min_y)) = (
        enabled().map(|crtc| crtc.x).min(),
        enabled().map(|crtc| crtc.y).min(),
    ) else {
        return Ok(());
    };
    if min_x == 0 && min_y == 0 {
        return Ok(());
    }

    for crtc in crtcs.values_mut().filter(|crtc| crtc.mode != 0) {
        let mode = modes.get(&crtc.mode).ok_or_else(|| HardwareError::Parse {
            what: "randr screen resources",
            reason: format!("unknown mode id {}", crtc.mode),
        })?;
        let shift = |value: i16, min: i16, extent: u16| {
            i16::try_from(i32::from(value) - i32::from(min))
                .ok()
                .filter(|shifted| i32::from(*shifted) + i32::from(extent) <= i32::from(i16::MAX))
                .ok_or_else(|| HardwareError::Unsupported("layout is too large".to_string()))
        };
        crtc.x = shift(crtc.x, min_x, mode.width)?;
        crtc.y = shift(crtc.y, min_y, mode.height)?;
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct ScreenSize {
    width: u16,
    height: u16,
    mm_width: u32,
    mm_height: u32,
}

fn compute_screen_size(
    modes: &Modes,
    outputs: &Outputs,
    crtcs: &Crtcs,
) -> Result<Option<ScreenSize>, HardwareError> {
    let bboxes = crtcs
        .values()
        .filter(|crtc| crtc.mode != 0)
        .map(|crtc| {
            let mode = modes.get(&crtc.mode).ok_or_else(|| HardwareError::Parse {
                what: "randr screen resources",
                reason: format!("unknown mode id {}", crtc.mode),
            })?;
            Ok((
                i32::from(crtc.x),
                i32::from(crtc.y),
                i32::from(crtc.x) + i32::from(mode.width),
                i32::from(crtc.y) + i32::from(mode.height),
            ))
        })
        .collect::<Result<Vec<_>, HardwareError>>()?;

    let min_x = bboxes.iter().map(|bbox| bbox.0).min();
    let min_y = bboxes.iter().map(|bbox| bbox.1).min();
    let max_x = bboxes.iter().map(|bbox| bbox.2).max();
    let max_y = bboxes.iter().map(|bbox| bbox.3).max();

    let (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) = (min_x, min_y, max_x, max_y) else {
        return Ok(None);
    };

    let too_large = |_| HardwareError::Unsupported("screen is too large".to_string());
    let width = u16::try_from(max_x - min_x).map_err(too_large)?;
    let height = u16::try_from(max_y - min_y).map_err(too_large)?;

    let (mm_width, mm_height) = crtcs
        .values()
        .filter(|crtc| crtc.mode != 0)
        .flat_map(|crtc_config| crtc_config.outputs.iter())
        .filter_map(|output_id| outputs.get(output_id))
        .map(|output| (output.mm_width, output.mm_height))
        .filter(|(w, h)| *w != 0 && *h != 0)
        .max_by_key(|(w, h)| u64::from(*w) * u64::from(*h))
        .unwrap_or_else(|| (px_to_mm(width), px_to_mm(height)));

    Ok(Some(ScreenSize {
        width,
        height,
        mm_width,
        mm_height,
    }))
}

fn px_to_mm(px: u16) -> u32 {
    const DPI: f32 = 96.0;
    const MM_PER_INCH: f32 = 25.4;

    (f32::from(px) * (MM_PER_INCH / DPI)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::testing;

    use maplit::hashmap;

    fn mode_info(id: randr::Mode, width: u16, height: u16) -> randr::ModeInfo {
        randr::ModeInfo {
            id,
            width,
            height,
            dot_clock: 148_500_000,
            htotal: 2200,
            vtotal: 1125,
            ..Default::default()
        }
    }

    #[test]
    #[ignore = "needs X11, manual"]
    fn read_configuration_smoke_test() {
        // Arrange

        // Act
        let configuration = read_configuration().expect("X11 is reachable");
        log::trace!("configuration = {configuration:?}");

        // Assert
        assert!(!configuration.outputs.is_empty());
        for output in &configuration.outputs {
            assert!(!output.connected || !output.modes.is_empty());
        }
    }

    #[test]
    #[ignore = "needs X11, manual"]
    fn submit_configuration_smoke_test() {
        // Arrange
        let configuration = read_configuration().expect("X11 is reachable");

        // Act
        submit_configuration(&configuration).expect("unchanged configuration is accepted");
        let new_configuration = read_configuration().expect("X11 is reachable");

        // Assert
        assert_eq!(configuration, new_configuration);
    }

    #[test]
    fn randr_output_into_configuration_maps_crtc_state() {
        // Arrange
        let full_hd = mode_info(1, 1920, 1080);
        let hd = mode_info(2, 1280, 720);
        let double_scan = randr::ModeInfo {
            mode_flags: randr::ModeFlag::DOUBLE_SCAN,
            ..mode_info(3, 320, 200)
        };
        let modes = hashmap! { 1 => &full_hd, 2 => &hd, 3 => &double_scan };
        let output = randr::GetOutputInfoReply {
            name: b"HDMI-1".to_vec(),
            connection: randr::Connection::CONNECTED,
            crtc: 20,
            modes: vec![1, 3, 2],
            mm_width: 510,
            mm_height: 290,
            ..Default::default()
        };
        let crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 1920, y: 0, mode: 2, outputs: vec![10], ..Default::default() },
        };

        // Act
        let configuration = randr_output_into_configuration(&output, &modes, &crtcs, None)
            .expect("known modes");

        // Assert
        assert_eq!(configuration.id.as_str(), "HDMI-1");
        assert!(configuration.connected);
        assert!(configuration.used);
        assert_eq!(configuration.top_left, Point { x: 1920, y: 0 });
        assert_eq!(configuration.modes.len(), 2);
        assert_eq!(configuration.current_mode_index, 1);
        assert_eq!(configuration.modes[0].refresh_rate_millihz, 60000);
        assert_eq!(configuration.physical_size_mm, (510, 290));
    }

    #[test]
    fn update_crtcs_moves_outputs_between_crtcs() {
        // Arrange
        let full_hd = mode_info(1, 1920, 1080);
        let hd = mode_info(2, 1280, 720);
        let modes = hashmap! { 1 => &full_hd, 2 => &hd };
        let outputs = hashmap! {
            10 => randr::GetOutputInfoReply {
                name: b"eDP-1".to_vec(),
                crtc: 20,
                crtcs: vec![20, 21],
                modes: vec![1, 2],
                ..Default::default()
            },
            11 => randr::GetOutputInfoReply {
                name: b"HDMI-1".to_vec(),
                crtc: 0,
                crtcs: vec![20, 21],
                modes: vec![1, 2],
                ..Default::default()
            },
        };
        let mut crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { mode: 1, outputs: vec![10], ..Default::default() },
            21 => randr::GetCrtcInfoReply { mode: 0, outputs: vec![], ..Default::default() },
        };

        let mut internal = testing::output("eDP-1");
        internal.used = false;
        let mut external = testing::output("HDMI-1");
        external.current_mode_index = 1;
        external.top_left = Point { x: 100, y: 50 };
        let configuration = DisplayConfiguration {
            outputs: vec![internal, external],
        };

        // Act
        update_crtcs(&configuration, &modes, &outputs, &mut crtcs).expect("free CRTC available");

        // Assert
        let enabled: Vec<_> = crtcs.values().filter(|crtc| crtc.mode != 0).collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].outputs, [11]);
        assert_eq!(enabled[0].mode, 2);
        assert_eq!((enabled[0].x, enabled[0].y), (100, 50));
    }

    #[test]
    fn update_crtcs_fails_without_free_crtc() {
        // Arrange
        let full_hd = mode_info(1, 1920, 1080);
        let modes = hashmap! { 1 => &full_hd };
        let outputs = hashmap! {
            10 => randr::GetOutputInfoReply { name: b"eDP-1".to_vec(), crtc: 20, crtcs: vec![20], modes: vec![1], ..Default::default() },
            11 => randr::GetOutputInfoReply { name: b"HDMI-1".to_vec(), crtc: 0, crtcs: vec![20], modes: vec![1], ..Default::default() },
        };
        let mut crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { mode: 1, outputs: vec![10], ..Default::default() },
        };
        let configuration = DisplayConfiguration {
            outputs: vec![testing::output("eDP-1"), testing::output("HDMI-1")],
        };

        // Act
        let result = update_crtcs(&configuration, &modes, &outputs, &mut crtcs);

        // Assert
        assert!(matches!(result, Err(HardwareError::Unsupported(_))));
    }

    #[test]
    fn check_supported_refuses_what_randr_cannot_apply() {
        // Arrange
        let mut scaled = testing::output("HDMI-1");
        scaled.scale = 2.0;
        let mut standby = testing::output("HDMI-1");
        standby.power_mode = PowerMode::Standby;
        let mut projector = testing::output("HDMI-1");
        projector.form_factor = FormFactor::Projector;
        let mut unused = testing::output("HDMI-1");
        unused.used = false;
        unused.form_factor = FormFactor::Projector;

        // Act
        let results: Vec<_> = [scaled, standby, projector, unused]
            .into_iter()
            .map(|output| check_supported(&DisplayConfiguration { outputs: vec![output] }))
            .collect();

        // Assert
        assert!(matches!(results[0], Err(HardwareError::Unsupported(_))));
        assert!(matches!(results[1], Err(HardwareError::Unsupported(_))));
        assert!(matches!(results[2], Err(HardwareError::Unsupported(_))));
        assert!(results[3].is_ok());
    }

    #[test]
    fn normalize_origin_shifts_negative_positions() {
        // Arrange
        let full_hd = mode_info(1, 1920, 1080);
        let modes = hashmap! { 1 => &full_hd };
        let mut crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec![10], ..Default::default() },
            21 => randr::GetCrtcInfoReply { x: -1920, y: -100, mode: 1, outputs: vec![11], ..Default::default() },
        };

        // Act
        normalize_origin(&modes, &mut crtcs).expect("layout fits");

        // Assert
        assert_eq!((crtcs[&20].x, crtcs[&20].y), (1920, 100));
        assert_eq!((crtcs[&21].x, crtcs[&21].y), (0, 0));
    }

    #[test]
    fn when_no_crtcs_compute_screen_size_returns_none() {
        // Arrange
        let modes = HashMap::new();
        let outputs = HashMap::new();
        let crtcs = HashMap::new();

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs);

        // Assert
        assert!(matches!(size, Ok(None)));
    }

    #[test]
    fn when_no_crtcs_enabled_compute_screen_size_returns_none() {
        // Arrange
        let modes = HashMap::new();
        let outputs = hashmap! {
            20 => randr::GetOutputInfoReply { ..Default::default() }
        };
        let crtcs = hashmap! {
            10 => randr::GetCrtcInfoReply { mode: 0, outputs: vec!{20}, ..Default::default() }
        };

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs);

        // Assert
        assert!(matches!(size, Ok(None)));
    }

    #[test]
    fn when_crtcs_enabled_compute_screen_size_returns_bbox_size_and_estimated_mm_size() {
        // Arrange
        let mode = mode_info(1, 640, 480);
        let modes = hashmap! {
            1 => &mode
        };
        let outputs = hashmap! {
            10 => randr::GetOutputInfoReply { ..Default::default() },
            11 => randr::GetOutputInfoReply { ..Default::default() },
        };
        let crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec!{10}, ..Default::default() },
            21 => randr::GetCrtcInfoReply { x: 10, y: 10, mode: 1, outputs: vec!{11}, ..Default::default() },
        };

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs).expect("known modes");

        // Assert
        assert_eq!(
            size,
            Some(ScreenSize {
                width: 650,
                height: 490,
                mm_width: px_to_mm(650),
                mm_height: px_to_mm(490)
            })
        );
    }

    #[test]
    fn when_crtcs_enabled_and_mm_sizes_known_compute_screen_size_returns_bbox_size_and_max_mm_size()
    {
        // Arrange
        let mode = mode_info(1, 640, 480);
        let modes = hashmap! {
            1 => &mode
        };
        let outputs = hashmap! {
            10 => randr::GetOutputInfoReply { mm_width: 100, mm_height: 400, ..Default::default() },
            11 => randr::GetOutputInfoReply { mm_width: 200, mm_height: 300, ..Default::default() },
        };
        let crtcs = hashmap! {
            20 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec!{10}, ..Default::default() },
            21 => randr::GetCrtcInfoReply { x: 0, y: 0, mode: 1, outputs: vec!{11}, ..Default::default() },
        };

        // Act
        let size = compute_screen_size(&modes, &outputs, &crtcs).expect("known modes");

        // Assert
        assert_eq!(
            size,
            Some(ScreenSize {
                width: 640,
                height: 480,
                mm_width: 200,
                mm_height: 300,
            })
        );
    }

    #[test]
    fn px_to_mm_test() {
        assert_eq!(px_to_mm(0), 0);
        assert_eq!(px_to_mm(u16::MAX), 17339);
    }
}
