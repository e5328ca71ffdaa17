//! KML document generation.

use crate::features::ordering::{OrderedPlacemark, OrderedPlacemarks};
use quick_xml::escape::escape;
use std::fmt::Write;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
pub const GX_NAMESPACE: &str = "http://www.google.com/kml/ext/2.2";
pub const ICON_HREF: &str = "http://maps.google.com/mapfiles/kml/shapes/donut.png";
pub const STYLE_ID: &str = "customIcon";

/// Settings for the animated fly-through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TourOptions {
    /// Seconds spent flying to each waypoint.
    pub fly_duration_secs: f64,
    /// Camera distance from each waypoint, in meters.
    pub look_at_range_m: f64,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self {
            fly_duration_secs: 3.0,
            look_at_range_m: 500.0,
        }
    }
}

/// A placemark ready to render: its ordering plus the archive path of its image.
#[derive(Debug, Clone, Copy)]
pub struct PlacemarkEntry<'a> {
    pub placemark: &'a OrderedPlacemark,
    /// Forward-slash path inside the archive, e.g. `files/IMG_1.jpg`.
    pub href: &'a str,
}

/// Formats a number so it always carries a decimal point and never an exponent.
pub fn format_number(value: f64) -> String {
    let s = value.to_string();
    if s.contains(['.', 'e', 'E']) || !value.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

/// `lon,lat` or `lon,lat,alt`. Longitude comes first, as KML requires.
pub fn coordinates(longitude: f64, latitude: f64, altitude: Option<f64>) -> String {
    let mut out = format!("{},{}", format_number(longitude), format_number(latitude));
    if let Some(alt) = altitude {
        out.push(',');
        out.push_str(&format_number(alt));
    }
    out
}

/// Wraps `text` in CDATA, splitting any `]]>` so the section can't end early.
fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

fn write_placemark(out: &mut String, entry: &PlacemarkEntry<'_>) -> std::fmt::Result {
    let placemark = entry.placemark;
    let record = &placemark.record;
    let file_name = record
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let description = format!(
        r#"<img src="{}" width="400"/><br/>Source file: {}"#,
        escape(entry.href),
        escape(file_name.as_str())
    );

    writeln!(out, "    <Placemark>")?;
    writeln!(out, "      <name>{}</name>", escape(placemark.name.as_str()))?;
    writeln!(out, "      <styleUrl>#{STYLE_ID}</styleUrl>")?;
    writeln!(out, "      <description>{}</description>", cdata(&description))?;
    if let Some(time) = &record.time {
        writeln!(
            out,
            r#"      <ExtendedData><Data name="DateTimeOriginal"><value>{}</value></Data></ExtendedData>"#,
            escape(time.to_iso().as_str())
        )?;
    }
    writeln!(
        out,
        "      <Point><coordinates>{}</coordinates></Point>",
        coordinates(record.gps.longitude, record.gps.latitude, record.gps.altitude)
    )?;
    writeln!(out, "    </Placemark>")
}

/// Writes a `gx:Tour` visiting `placemarks` in the given order.
///
/// The tour needs a numeric altitude, so a missing one is flown at 0 here even though
/// the placemark itself leaves it out.
fn write_tour(
    out: &mut String,
    placemarks: &[OrderedPlacemark],
    options: &TourOptions,
) -> std::fmt::Result {
    writeln!(out, "    <gx:Tour>")?;
    writeln!(out, "      <name>Fly-through</name>")?;
    writeln!(out, "      <gx:Playlist>")?;
    for placemark in placemarks {
        let gps = &placemark.record.gps;
        writeln!(out, "        <gx:FlyTo>")?;
        writeln!(
            out,
            "          <gx:duration>{}</gx:duration>",
            format_number(options.fly_duration_secs)
        )?;
        writeln!(out, "          <gx:flyToMode>smooth</gx:flyToMode>")?;
        writeln!(out, "          <LookAt>")?;
        writeln!(out, "            <longitude>{}</longitude>", format_number(gps.longitude))?;
        writeln!(out, "            <latitude>{}</latitude>", format_number(gps.latitude))?;
        writeln!(
            out,
            "            <altitude>{}</altitude>",
            format_number(gps.altitude.unwrap_or(0.0))
        )?;
        writeln!(out, "            <heading>0</heading>")?;
        writeln!(out, "            <tilt>0</tilt>")?;
        writeln!(out, "            <range>{}</range>", format_number(options.look_at_range_m))?;
        writeln!(out, "            <altitudeMode>absolute</altitudeMode>")?;
        writeln!(out, "          </LookAt>")?;
        writeln!(out, "        </gx:FlyTo>")?;
    }
    writeln!(out, "      </gx:Playlist>")?;
    writeln!(out, "    </gx:Tour>")
}

fn write_document(
    out: &mut String,
    doc_name: &str,
    ordered: &OrderedPlacemarks,
    hrefs: &dyn Fn(&OrderedPlacemark) -> String,
    tour: Option<&TourOptions>,
) -> std::fmt::Result {
    writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(out, r#"<kml xmlns="{KML_NAMESPACE}" xmlns:gx="{GX_NAMESPACE}">"#)?;
    writeln!(out, "  <Document>")?;
    writeln!(out, "    <name>{}</name>", escape(doc_name))?;
    writeln!(out, "    <open>1</open>")?;
    writeln!(out, r#"    <Style id="{STYLE_ID}">"#)?;
    writeln!(out, "      <IconStyle>")?;
    writeln!(out, "        <Icon>")?;
    writeln!(out, "          <href>{ICON_HREF}</href>")?;
    writeln!(out, "        </Icon>")?;
    writeln!(out, "        <scale>1.2</scale>")?;
    writeln!(out, "      </IconStyle>")?;
    writeln!(out, "      <BalloonStyle>")?;
    writeln!(
        out,
        "        <text>{}</text>",
        cdata("<b>$[name]</b><br/>$[description]")
    )?;
    writeln!(out, "      </BalloonStyle>")?;
    writeln!(out, "    </Style>")?;

    for placemark in ordered.newest_first() {
        let href = hrefs(placemark);
        write_placemark(
            out,
            &PlacemarkEntry {
                placemark,
                href: &href,
            },
        )?;
    }

    if let Some(options) = tour {
        write_tour(out, ordered.chronological(), options)?;
    }

    writeln!(out, "  </Document>")?;
    writeln!(out, "</kml>")
}

/// Renders the whole document: placemarks most recent first, then the optional
/// fly-through, oldest first.
///
/// `hrefs` maps each placemark to the archive path of its image.
pub fn render_kml(
    doc_name: &str,
    ordered: &OrderedPlacemarks,
    hrefs: impl Fn(&OrderedPlacemark) -> String,
    tour: Option<&TourOptions>,
) -> String {
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = write_document(&mut out, doc_name, ordered, &hrefs, tour);
    out
}
