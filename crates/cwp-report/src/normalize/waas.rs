//! WAAS event normalization and grouping

use std::collections::HashMap;

use crate::error::Result;
use crate::records::{RawWaasEvent, UrlGroup, WaasRecord};
use crate::timefmt::waas_local_time;

/// Flatten one WAAS audit
pub fn normalize_waas(raw: &RawWaasEvent, offset_hours: i32) -> Result<WaasRecord> {
    Ok(WaasRecord {
        host: derive_host(&raw.url).to_string(),
        url: raw.url.clone(),
        time: waas_local_time(&raw.time, offset_hours)?,
        // Events without a namespace report an empty one
        namespace: raw.ns.first().cloned().unwrap_or_default(),
        attack_type: raw.attack_type.clone(),
        endpoint: format!("{} {}", raw.method, raw.url_path),
        source_ip: raw.subnet.clone(),
        path: raw.url_path.clone(),
        image: raw.image_name.clone(),
        effect: raw.effect.clone(),
    })
}

/// Host part of a URL: the text between `//` and the next `/`
pub fn derive_host(url: &str) -> &str {
    let rest = match url.find("//") {
        Some(pos) => &url[pos + 2..],
        None => url,
    };
    match rest.find('/') {
        Some(end) => &rest[..end],
        None => rest,
    }
}

/// Group records by URL, first-seen URL first
pub fn group_by_url(records: Vec<WaasRecord>) -> Vec<UrlGroup> {
    let mut groups: Vec<UrlGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        match index.get(&record.url) {
            Some(&i) => groups[i].records.push(record),
            None => {
                tracing::debug!(url = %record.url, "new URL group");
                index.insert(record.url.clone(), groups.len());
                groups.push(UrlGroup {
                    url: record.url.clone(),
                    records: vec![record],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(url: &str, path: &str) -> RawWaasEvent {
        RawWaasEvent {
            time: "2024-03-05T10:15:30Z".into(),
            url: url.into(),
            attack_type: "xss".into(),
            method: "GET".into(),
            url_path: path.into(),
            subnet: "10.1.2.3".into(),
            image_name: "shop/web:1.0".into(),
            ns: vec!["prod".into(), "extra".into()],
            effect: "alert".into(),
        }
    }

    #[test]
    fn test_derive_host() {
        assert_eq!(derive_host("https://example.com/api/v1/x"), "example.com");
        assert_eq!(derive_host("http://10.0.0.1:8080/"), "10.0.0.1:8080");
        assert_eq!(derive_host("https://example.com"), "example.com");
        assert_eq!(derive_host("example.com/path"), "example.com");
        assert_eq!(derive_host(""), "");
    }

    #[test]
    fn test_normalize_fields() {
        let record = normalize_waas(&raw("https://shop.example/cart", "/cart"), 7).unwrap();

        assert_eq!(record.host, "shop.example");
        assert_eq!(record.time, "05-03-2024 17:15:30");
        assert_eq!(record.namespace, "prod");
        assert_eq!(record.endpoint, "GET /cart");
        assert_eq!(record.source_ip, "10.1.2.3");
        assert_eq!(record.path, "/cart");
        assert_eq!(record.image, "shop/web:1.0");
        assert_eq!(record.effect, "alert");
    }

    #[test]
    fn test_empty_namespace_list() {
        let mut event = raw("https://a/x", "/x");
        event.ns.clear();
        assert_eq!(normalize_waas(&event, 7).unwrap().namespace, "");
    }

    #[test]
    fn test_group_order() {
        let records: Vec<WaasRecord> = [("A", "/1"), ("B", "/2"), ("A", "/3"), ("C", "/4")]
            .iter()
            .map(|(url, path)| normalize_waas(&raw(url, path), 7).unwrap())
            .collect();

        let groups = group_by_url(records);
        let urls: Vec<&str> = groups.iter().map(|g| g.url.as_str()).collect();
        assert_eq!(urls, vec!["A", "B", "C"]);

        let paths: Vec<&str> = groups[0].records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/1", "/3"]);
        assert_eq!(groups[1].records.len(), 1);
    }
}
