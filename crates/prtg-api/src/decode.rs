// Response decoding
//
// The wire format is chosen once per response from its content type:
// XML for `text/xml` and `text/html` (some PRTG deployments label XML as
// HTML), JSON for everything else. XML goes through the value-tree fold
// in `crate::xml` so both formats land in the same serde models.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::Error;
use crate::transport::RawResponse;
use crate::xml;

/// Wire format of a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Format {
    #[strum(serialize = "JSON")]
    Json,
    #[strum(serialize = "XML")]
    Xml,
}

impl Format {
    /// Select the format from a `Content-Type` header value.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let mime = content_type
            .unwrap_or_default()
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "text/xml" | "text/html" => Self::Xml,
            _ => Self::Json,
        }
    }
}

/// Decodes response bodies into serde models.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    /// Tolerate the malformed XML PRTG's serializer emits (mismatched
    /// end tags, unknown entities, unclosed elements). JSON is always strict.
    pub lenient_xml: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self { lenient_xml: true }
    }
}

impl Decoder {
    pub fn new(lenient_xml: bool) -> Self {
        Self { lenient_xml }
    }

    /// Decode a response into a generic value tree.
    pub fn decode_value(&self, resp: &RawResponse) -> Result<Value, Error> {
        let format = Format::from_content_type(resp.content_type());
        trace!(%format, bytes = resp.body.len(), "decoding response");
        match format {
            Format::Json => serde_json::from_slice(&resp.body)
                .map_err(|e| Error::decode(format, e.to_string(), &resp.body)),
            Format::Xml => xml::to_value(&resp.body, self.lenient_xml)
                .map_err(|e| Error::decode(format, e, &resp.body)),
        }
    }

    /// Decode a response into `T`.
    pub fn decode<T: DeserializeOwned>(&self, resp: &RawResponse) -> Result<T, Error> {
        let format = Format::from_content_type(resp.content_type());
        match format {
            Format::Json => serde_json::from_slice(&resp.body)
                .map_err(|e| Error::decode(format, e.to_string(), &resp.body)),
            Format::Xml => {
                let value = self.decode_value(resp)?;
                serde_json::from_value(value)
                    .map_err(|e| Error::decode(format, e.to_string(), &resp.body))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use serde::Deserialize;

    fn response(content_type: &'static str, body: &'static str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        RawResponse::new(body, headers)
    }

    #[derive(Debug, Deserialize)]
    struct Version {
        #[serde(rename = "prtg-version", alias = "prtgversion")]
        version: String,
    }

    #[test]
    fn format_selection() {
        assert_eq!(Format::from_content_type(Some("text/xml; charset=UTF-8")), Format::Xml);
        assert_eq!(Format::from_content_type(Some("text/html")), Format::Xml);
        assert_eq!(Format::from_content_type(Some("TEXT/HTML;charset=utf-8")), Format::Xml);
        assert_eq!(Format::from_content_type(Some("application/json")), Format::Json);
        assert_eq!(Format::from_content_type(Some("application/xml")), Format::Json);
        assert_eq!(Format::from_content_type(None), Format::Json);
    }

    #[test]
    fn html_labelled_xml_is_decoded_as_xml() {
        let resp = response("text/html", "<status><prtg-version>24.1</prtg-version></status>");
        let v: Version = Decoder::default().decode(&resp).unwrap();
        assert_eq!(v.version, "24.1");
    }

    #[test]
    fn json_is_strict() {
        let resp = response("application/json", r#"{"prtgversion": "24.1",}"#);
        let err = Decoder::default().decode::<Version>(&resp).unwrap_err();
        match err {
            Error::Decode { format, body, .. } => {
                assert_eq!(format, Format::Json);
                assert_eq!(body, r#"{"prtgversion": "24.1",}"#);
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn strict_xml_rejects_what_lenient_accepts() {
        let resp = response("text/xml", "<status><prtg-version>24.1</version></status>");
        assert!(Decoder::new(false).decode::<Version>(&resp).is_err());
        let v: Version = Decoder::new(true).decode(&resp).unwrap();
        assert_eq!(v.version, "24.1");
    }
}
