//! `trapper frame` - render a request frame without sending it.

use trapper_core::MetricSource;
use trapper_core::protocol::{HEADER_LEN, decode_header, encode_frame, render_body};
use trapper_core::status::{Status, epoch_seconds};

use super::parse_items;

/// Run the frame command.
pub fn run(host: &str, items: &[String], clock: Option<i64>, hex: bool) {
    let source = parse_items(items);
    let statuses: Vec<Status> = source
        .readings()
        .into_iter()
        .map(|r| {
            let status = Status::new(host, r.key, r.value);
            match clock {
                Some(c) => status.with_clock(c),
                None => status,
            }
        })
        .collect();

    let frame = render_frame(&statuses, clock.unwrap_or_else(epoch_seconds));
    print!("{}", describe(&frame, hex));
}

/// Frame bytes for `statuses`, with the request stamped at `clock`.
fn render_frame(statuses: &[Status], clock: i64) -> Vec<u8> {
    encode_frame(render_body(statuses, clock).json.as_bytes())
}

/// Human-readable header summary followed by the body.
fn describe(frame: &[u8], hex: bool) -> String {
    let mut out = String::new();
    match decode_header(frame) {
        Ok(header) => {
            out.push_str(&format!(
                "magic:   ZBXD\nflags:   0x{:02x}\nlength:  {} bytes\n",
                header.flags, header.length
            ));
        }
        Err(e) => {
            out.push_str(&format!("invalid frame: {e}\n"));
            return out;
        }
    }
    if hex {
        let bytes: Vec<String> = frame[..HEADER_LEN]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        out.push_str(&format!("header:  {}\n", bytes.join(" ")));
    }
    out.push_str(&format!("total:   {} bytes\n\n", frame.len()));
    out.push_str(&String::from_utf8_lossy(&frame[HEADER_LEN..]));
    out.push('\n');
    out
}
