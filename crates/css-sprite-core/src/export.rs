use crate::model::SpriteOutput;
use serde_json::{Value, json};

/// Serialize a run as `{ composites, stylesheets, meta }`.
///
/// Each composite lists its frames (source path and drawn rect); each stylesheet
/// lists the composites it references. Intended for build tooling that wants to
/// know what was produced without parsing the CSS.
pub fn to_json_manifest(output: &SpriteOutput) -> Value {
    let composites: Vec<Value> = output
        .composites
        .iter()
        .map(|c| {
            let frames: Vec<Value> = c
                .frames
                .iter()
                .map(|f| {
                    json!({
                        "source": f.source.to_string_lossy(),
                        "frame": {"x": f.frame.x, "y": f.frame.y, "w": f.frame.w, "h": f.frame.h},
                    })
                })
                .collect();
            json!({
                "name": c.name,
                "width": c.width,
                "height": c.height,
                "bytes": c.encoded.len(),
                "frames": frames,
            })
        })
        .collect();

    let stylesheets: Vec<Value> = output
        .units
        .iter()
        .map(|u| json!({"css": u.css_name, "composites": u.composites}))
        .collect();

    let stats = output.stats();
    json!({
        "composites": composites,
        "stylesheets": stylesheets,
        "meta": {
            "app": "css-sprite",
            "version": env!("CARGO_PKG_VERSION"),
            "occupancy": stats.occupancy,
        },
    })
}
