use crate::error::{Error, Result};

/// One splat: position, DC color coefficients, opacity, per-axis scale and a
/// quaternion rotation. Matches the 3DGS PLY vertex layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPoint {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub opacity: f32,
    pub scale: [f32; 3],
    pub rotation: [f32; 4],
}

impl Default for GaussianPoint {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            color: [0.0; 3],
            opacity: 0.0,
            scale: [0.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// An in-memory gaussian point cloud as produced by the generation pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaussianCloud {
    pub points: Vec<GaussianPoint>,
}

/// Property names written (and understood) per vertex, in canonical order.
const PROPERTIES: [&str; 14] = [
    "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "opacity", "scale_0", "scale_1", "scale_2",
    "rot_0", "rot_1", "rot_2", "rot_3",
];

impl GaussianCloud {
    pub fn new(points: Vec<GaussianPoint>) -> Self {
        Self { points }
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Axis-aligned bounds of all positions, `None` for an empty cloud.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = self.points.first()?;
        let mut min = first.position;
        let mut max = first.position;
        for point in &self.points {
            for axis in 0..3 {
                min[axis] = min[axis].min(point.position[axis]);
                max[axis] = max[axis].max(point.position[axis]);
            }
        }
        Some((min, max))
    }

    /// Parse a binary little-endian 3DGS PLY.
    ///
    /// Unknown float properties are skipped; the known ones may appear in any
    /// order. Truncated bodies and non-float properties are rejected.
    pub fn from_ply_bytes(bytes: &[u8]) -> Result<Self> {
        let (header, body) = split_header(bytes)?;

        let mut vertex_count: Option<usize> = None;
        let mut property_names: Vec<String> = Vec::new();
        let mut saw_format = false;

        for line in header.lines().map(str::trim) {
            let mut words = line.split_whitespace();
            match words.next() {
                Some("format") => {
                    if words.next() != Some("binary_little_endian") {
                        return Err(Error::Ply(format!("unsupported format: {line}")));
                    }
                    saw_format = true;
                }
                Some("element") => {
                    if words.next() == Some("vertex") {
                        let count = words
                            .next()
                            .and_then(|w| w.parse::<usize>().ok())
                            .ok_or_else(|| Error::Ply(format!("bad vertex element: {line}")))?;
                        vertex_count = Some(count);
                    } else if vertex_count.is_some() {
                        return Err(Error::Ply("trailing non-vertex elements are unsupported".into()));
                    }
                }
                Some("property") if vertex_count.is_some() => {
                    if words.next() != Some("float") {
                        return Err(Error::Ply(format!("non-float vertex property: {line}")));
                    }
                    let name = words
                        .next()
                        .ok_or_else(|| Error::Ply(format!("unnamed property: {line}")))?;
                    property_names.push(name.to_string());
                }
                _ => {}
            }
        }

        if !saw_format {
            return Err(Error::Ply("missing format declaration".into()));
        }
        let vertex_count =
            vertex_count.ok_or_else(|| Error::Ply("missing vertex element".into()))?;

        let stride = property_names.len() * 4;
        if body.len() < vertex_count * stride {
            return Err(Error::Ply(format!(
                "body truncated: need {} bytes, have {}",
                vertex_count * stride,
                body.len()
            )));
        }

        let mut points = Vec::with_capacity(vertex_count);
        for index in 0..vertex_count {
            let record = &body[index * stride..(index + 1) * stride];
            let mut point = GaussianPoint::default();
            for (slot, name) in property_names.iter().enumerate() {
                let offset = slot * 4;
                let value = f32::from_le_bytes([
                    record[offset],
                    record[offset + 1],
                    record[offset + 2],
                    record[offset + 3],
                ]);
                assign_property(&mut point, name, value);
            }
            points.push(point);
        }

        Ok(Self { points })
    }

    /// Serialize as a binary little-endian PLY in canonical property order.
    pub fn write_ply(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.points.len() * PROPERTIES.len() * 4);
        out.extend_from_slice(b"ply\n");
        out.extend_from_slice(b"format binary_little_endian 1.0\n");
        out.extend_from_slice(format!("element vertex {}\n", self.points.len()).as_bytes());
        for name in PROPERTIES {
            out.extend_from_slice(format!("property float {name}\n").as_bytes());
        }
        out.extend_from_slice(b"end_header\n");

        for point in &self.points {
            for value in [
                point.position[0],
                point.position[1],
                point.position[2],
                point.color[0],
                point.color[1],
                point.color[2],
                point.opacity,
                point.scale[0],
                point.scale[1],
                point.scale[2],
                point.rotation[0],
                point.rotation[1],
                point.rotation[2],
                point.rotation[3],
            ] {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }

        out
    }
}

fn assign_property(point: &mut GaussianPoint, name: &str, value: f32) {
    match name {
        "x" => point.position[0] = value,
        "y" => point.position[1] = value,
        "z" => point.position[2] = value,
        "f_dc_0" => point.color[0] = value,
        "f_dc_1" => point.color[1] = value,
        "f_dc_2" => point.color[2] = value,
        "opacity" => point.opacity = value,
        "scale_0" => point.scale[0] = value,
        "scale_1" => point.scale[1] = value,
        "scale_2" => point.scale[2] = value,
        "rot_0" => point.rotation[0] = value,
        "rot_1" => point.rotation[1] = value,
        "rot_2" => point.rotation[2] = value,
        "rot_3" => point.rotation[3] = value,
        // Higher-order SH coefficients and anything else are ignored.
        _ => {}
    }
}

fn split_header(bytes: &[u8]) -> Result<(&str, &[u8])> {
    const END: &[u8] = b"end_header\n";
    let end = bytes
        .windows(END.len())
        .position(|window| window == END)
        .ok_or_else(|| Error::Ply("missing end_header".into()))?;
    let header = std::str::from_utf8(&bytes[..end])
        .map_err(|_| Error::Ply("header is not valid UTF-8".into()))?;
    if !header.starts_with("ply") {
        return Err(Error::Ply("missing ply magic".into()));
    }
    Ok((header, &bytes[end + END.len()..]))
}
