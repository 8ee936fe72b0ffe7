//! Live filter lookup against the SVO Filter Profile Service.
//!
//! The FPS answers `fps.php?ID=<filterID>` with a VOTable document whose `PARAM` elements
//! carry the band metadata. Only the three parameters the pipeline needs are extracted;
//! everything else in the document is ignored. An identifier the service does not know
//! yields a VOTable without a `WavelengthEff` parameter, which maps to
//! [`BolfitError::UnknownFilter`].
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::bolfit_errors::BolfitError;
use crate::env_state::BolfitEnv;

use super::FilterBand;

const SVO_FPS_URL: &str = "http://svo2.cab.inta-csic.es/theory/fps/fps.php?ID=";

#[derive(Debug, Deserialize)]
struct VoTable {
    #[serde(rename = "RESOURCE")]
    resource: Option<VoResource>,
}

#[derive(Debug, Deserialize)]
struct VoResource {
    #[serde(rename = "TABLE")]
    table: Option<VoTableElement>,
}

#[derive(Debug, Deserialize)]
struct VoTableElement {
    #[serde(rename = "PARAM", default)]
    params: Vec<VoParam>,
}

#[derive(Debug, Deserialize)]
struct VoParam {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@value")]
    value: String,
}

/// Query the SVO FPS for one filter identifier.
///
/// Arguments
/// ---------
/// * `env`: shared HTTP environment (carries the bounded timeout)
/// * `filter_id`: SVO identifier, e.g. `"Swift/UVOT.U"`
///
/// Return
/// ------
/// * The resolved [`FilterBand`], [`BolfitError::UnknownFilter`] when the service does not
///   know the identifier, or [`BolfitError::FilterServiceError`] on transport failure.
pub(crate) fn query_svo_filter(
    env: &BolfitEnv,
    filter_id: &str,
) -> Result<FilterBand, BolfitError> {
    let url = format!("{SVO_FPS_URL}{filter_id}");
    let body = env.get_from_url(url)?;
    parse_votable(&body, filter_id)
}

/// Extract a [`FilterBand`] from a VOTable document body.
fn parse_votable(body: &str, filter_id: &str) -> Result<FilterBand, BolfitError> {
    let votable: VoTable = from_str(body).map_err(|e| BolfitError::VoTableParseError {
        filter_id: filter_id.to_string(),
        reason: e.to_string(),
    })?;

    let params = votable
        .resource
        .and_then(|r| r.table)
        .map(|t| t.params)
        .unwrap_or_default();

    let lookup = |name: &str| -> Option<f64> {
        params
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value.trim().parse::<f64>().ok())
    };

    let wavelength_eff = lookup("WavelengthEff")
        .ok_or_else(|| BolfitError::UnknownFilter(filter_id.to_string()))?;
    let width_eff =
        lookup("WidthEff").ok_or_else(|| BolfitError::UnknownFilter(filter_id.to_string()))?;
    let zero_point =
        lookup("ZeroPoint").ok_or_else(|| BolfitError::UnknownFilter(filter_id.to_string()))?;

    Ok(FilterBand {
        id: filter_id.to_string(),
        wavelength_eff,
        width_eff,
        zero_point,
    })
}

#[cfg(test)]
mod test_svo {
    use super::*;

    const FOUND: &str = r#"<?xml version="1.0"?>
<VOTABLE version="1.1">
  <INFO name="QUERY_STATUS" value="OK"/>
  <RESOURCE type="results">
    <TABLE>
      <PARAM name="filterID" value="Swift/UVOT.B" datatype="char" arraysize="*"/>
      <PARAM name="WavelengthEff" value="4349.56" unit="Angstrom" datatype="double"/>
      <PARAM name="WidthEff" value="975.04" unit="Angstrom" datatype="double"/>
      <PARAM name="ZeroPoint" value="4093.36" unit="Jy" datatype="double"/>
      <PARAM name="ZeroPointType" value="Pogson" datatype="char" arraysize="*"/>
    </TABLE>
  </RESOURCE>
</VOTABLE>"#;

    const NOT_FOUND: &str = r#"<?xml version="1.0"?>
<VOTABLE version="1.1">
  <INFO name="QUERY_STATUS" value="ERROR"/>
</VOTABLE>"#;

    #[test]
    fn test_parse_votable_found() {
        let band = parse_votable(FOUND, "Swift/UVOT.B").unwrap();
        assert_eq!(band.id, "Swift/UVOT.B");
        assert_eq!(band.wavelength_eff, 4349.56);
        assert_eq!(band.width_eff, 975.04);
        assert_eq!(band.zero_point, 4093.36);
    }

    #[test]
    fn test_parse_votable_unknown_filter() {
        let err = parse_votable(NOT_FOUND, "Made/Up.band").unwrap_err();
        assert_eq!(err, BolfitError::UnknownFilter("Made/Up.band".to_string()));
    }

    #[test]
    fn test_parse_votable_garbage() {
        let err = parse_votable("this is not xml <", "X/Y.z").unwrap_err();
        assert!(matches!(err, BolfitError::VoTableParseError { .. }));
    }
}
