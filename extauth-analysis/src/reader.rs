//! Reader trait boundaries, so the analysis controllers below depend only
//! on "something that can answer an ASN/GeoIP lookup" rather than directly
//! on `maxminddb` or a specific `.mmdb` file on disk.

use std::net::IpAddr;

/// Looks up the autonomous system a source IP belongs to.
pub trait AsnReader: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<(u32, String)>;
}

/// Looks up the approximate location of a source IP.
pub trait GeoIpReader: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Option<(f64, f64, Option<String>)>;
}

#[derive(Debug, thiserror::Error)]
pub enum MaxmindError {
    #[error("failed to open MaxMind database {path:?}: {source}")]
    Open {
        path: String,
        #[source]
        source: maxminddb::MaxMindDBError,
    },
}

/// An [`AsnReader`] backed by a memory-mapped MaxMind GeoLite2-ASN (or
/// GeoIP2-ISP) `.mmdb` file.
pub struct MaxmindAsnReader {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxmindAsnReader {
    pub fn open(path: &str) -> Result<Self, MaxmindError> {
        let reader = maxminddb::Reader::open_readfile(path).map_err(|source| MaxmindError::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(Self { reader })
    }
}

impl AsnReader for MaxmindAsnReader {
    fn lookup(&self, ip: IpAddr) -> Option<(u32, String)> {
        let record: maxminddb::geoip2::Asn = self.reader.lookup(ip).ok()??;
        let number = record.autonomous_system_number?;
        let organization = record.autonomous_system_organization.unwrap_or("").to_string();
        Some((number, organization))
    }
}

/// A [`GeoIpReader`] backed by a memory-mapped MaxMind GeoLite2-City (or
/// GeoIP2-City) `.mmdb` file.
pub struct MaxmindGeoIpReader {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxmindGeoIpReader {
    pub fn open(path: &str) -> Result<Self, MaxmindError> {
        let reader = maxminddb::Reader::open_readfile(path).map_err(|source| MaxmindError::Open {
            path: path.to_string(),
            source,
        })?;
        Ok(Self { reader })
    }
}

impl GeoIpReader for MaxmindGeoIpReader {
    fn lookup(&self, ip: IpAddr) -> Option<(f64, f64, Option<String>)> {
        let record: maxminddb::geoip2::City = self.reader.lookup(ip).ok()??;
        let location = record.location?;
        let latitude = location.latitude?;
        let longitude = location.longitude?;
        let country_iso = record.country.and_then(|c| c.iso_code).map(str::to_string);
        Some((latitude, longitude, country_iso))
    }
}
