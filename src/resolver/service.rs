//! External IP lookup services and their response shapes
//!
//! Each service pairs an endpoint with a [`ResponseFormat`] describing where
//! the caller's address lives in the body. Adding a service is a table
//! entry (or a `[[resolver.services]]` block in the config file), never a
//! code change in the resolver.

use crate::ip::IpAddress;
use crate::resolver::attempt::AttemptError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How to pull the caller's address (and optional registration metadata)
/// out of a response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResponseFormat {
    /// JSON object with the address in a string field
    Json {
        ip_field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        org_field: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        country_field: Option<String>,
    },
    /// JSON string field holding a comma-separated list; the first entry wins
    CommaList { field: String },
    /// Plain-text body containing only the address
    Text,
}

/// Address plus whatever identity metadata the service reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub ip: IpAddress,
    pub org: Option<String>,
    pub country: Option<String>,
    /// Name of the service that produced this identity
    pub service: String,
}

impl ResponseFormat {
    pub fn json(ip_field: &str) -> Self {
        ResponseFormat::Json {
            ip_field: ip_field.to_string(),
            org_field: None,
            country_field: None,
        }
    }

    /// Parse a response body into an [`Identity`]
    ///
    /// Missing fields, non-string fields, invalid JSON and empty addresses
    /// are all reported as [`AttemptError::Malformed`].
    pub fn parse(&self, service: &str, body: &str) -> Result<Identity, AttemptError> {
        let (ip, org, country) = match self {
            ResponseFormat::Json {
                ip_field,
                org_field,
                country_field,
            } => {
                let value = parse_object(body)?;
                let ip = string_field(&value, ip_field)?;
                let org = org_field
                    .as_deref()
                    .and_then(|field| optional_field(&value, field));
                let country = country_field
                    .as_deref()
                    .and_then(|field| optional_field(&value, field));
                (IpAddress::new(&ip), org, country)
            }
            ResponseFormat::CommaList { field } => {
                let value = parse_object(body)?;
                let list = string_field(&value, field)?;
                let first = list.split(',').next().unwrap_or_default();
                (IpAddress::new(first), None, None)
            }
            ResponseFormat::Text => (IpAddress::new(body), None, None),
        };

        if ip.is_empty() {
            return Err(AttemptError::Malformed("empty address".to_string()));
        }

        Ok(Identity {
            ip,
            org,
            country,
            service: service.to_string(),
        })
    }
}

fn parse_object(body: &str) -> Result<serde_json::Value, AttemptError> {
    serde_json::from_str(body).map_err(|e| AttemptError::Malformed(format!("invalid JSON: {}", e)))
}

fn string_field(value: &serde_json::Value, field: &str) -> Result<String, AttemptError> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(String::from)
        .ok_or_else(|| AttemptError::Malformed(format!("missing string field '{}'", field)))
}

fn optional_field(value: &serde_json::Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// One external IP lookup endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub url: String,
    /// Overrides the resolver-wide timeout for this service
    #[serde(
        default,
        rename = "timeout_ms",
        with = "opt_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    pub format: ResponseFormat,
}

impl Service {
    pub fn new(name: &str, url: &str, format: ResponseFormat) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            timeout: None,
            format,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Built-in service table, in fallback order
pub fn default_services() -> Vec<Service> {
    vec![
        Service::new(
            "ifconfig.co",
            "https://ifconfig.co/json",
            ResponseFormat::Json {
                ip_field: "ip".to_string(),
                org_field: Some("asn_org".to_string()),
                country_field: Some("country".to_string()),
            },
        ),
        Service::new(
            "ipify",
            "https://api.ipify.org?format=json",
            ResponseFormat::json("ip"),
        ),
        Service::new(
            "httpbin",
            "https://httpbin.org/ip",
            ResponseFormat::CommaList {
                field: "origin".to_string(),
            },
        ),
        Service::new("icanhazip", "https://icanhazip.com", ResponseFormat::Text),
    ]
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ifconfig_format() -> ResponseFormat {
        ResponseFormat::Json {
            ip_field: "ip".to_string(),
            org_field: Some("asn_org".to_string()),
            country_field: Some("country".to_string()),
        }
    }

    #[test]
    fn test_parse_json_ip_with_metadata() {
        let body = r#"{"ip": "198.51.100.4", "asn_org": "SHAW", "country": "Canada"}"#;
        let identity = ifconfig_format().parse("ifconfig.co", body).unwrap();

        assert_eq!(identity.ip, IpAddress::new("198.51.100.4"));
        assert_eq!(identity.org.as_deref(), Some("SHAW"));
        assert_eq!(identity.country.as_deref(), Some("Canada"));
        assert_eq!(identity.service, "ifconfig.co");
    }

    #[test]
    fn test_parse_json_metadata_optional() {
        let body = r#"{"ip": "198.51.100.4"}"#;
        let identity = ifconfig_format().parse("ifconfig.co", body).unwrap();
        assert!(identity.org.is_none());
        assert!(identity.country.is_none());
    }

    #[test]
    fn test_parse_json_missing_ip_is_malformed() {
        let result = ResponseFormat::json("ip").parse("ipify", r#"{"address": "1.2.3.4"}"#);
        assert!(matches!(result, Err(AttemptError::Malformed(_))));
    }

    #[test]
    fn test_parse_json_non_string_ip_is_malformed() {
        let result = ResponseFormat::json("ip").parse("ipify", r#"{"ip": 1234}"#);
        assert!(matches!(result, Err(AttemptError::Malformed(_))));
    }

    #[test]
    fn test_parse_invalid_json_is_malformed() {
        let result = ResponseFormat::json("ip").parse("ipify", "<html>rate limited</html>");
        assert!(matches!(result, Err(AttemptError::Malformed(_))));
    }

    #[test]
    fn test_parse_comma_list_takes_first_entry() {
        let format = ResponseFormat::CommaList {
            field: "origin".to_string(),
        };
        let identity = format
            .parse("httpbin", r#"{"origin": "203.0.113.9 , 10.0.0.1"}"#)
            .unwrap();
        assert_eq!(identity.ip.as_str(), "203.0.113.9");
    }

    #[test]
    fn test_parse_text_trims_body() {
        let identity = ResponseFormat::Text.parse("icanhazip", "203.0.113.9\n").unwrap();
        assert_eq!(identity.ip.as_str(), "203.0.113.9");
    }

    #[test]
    fn test_parse_empty_text_is_malformed() {
        let result = ResponseFormat::Text.parse("icanhazip", "  \n");
        assert!(matches!(result, Err(AttemptError::Malformed(_))));
    }

    #[test]
    fn test_default_services_order() {
        let names: Vec<_> = default_services().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["ifconfig.co", "ipify", "httpbin", "icanhazip"]);
    }

    #[test]
    fn test_service_from_toml() {
        let toml_str = r#"
            name = "custom"
            url = "https://ip.example.com/"
            timeout_ms = 3000

            [format]
            kind = "comma-list"
            field = "origin"
        "#;
        let service: Service = toml::from_str(toml_str).unwrap();
        assert_eq!(service.timeout, Some(Duration::from_secs(3)));
        assert_eq!(
            service.format,
            ResponseFormat::CommaList {
                field: "origin".to_string()
            }
        );
    }

    #[test]
    fn test_sub_second_timeout_survives_toml() {
        let service = Service::new("fast", "https://ip.example.com/", ResponseFormat::Text)
            .with_timeout(Duration::from_millis(50));

        let toml_str = toml::to_string(&service).unwrap();
        assert!(toml_str.contains("timeout_ms = 50"));

        let reloaded: Service = toml::from_str(&toml_str).unwrap();
        assert_eq!(reloaded.timeout, Some(Duration::from_millis(50)));
        assert_eq!(reloaded, service);
    }
}
