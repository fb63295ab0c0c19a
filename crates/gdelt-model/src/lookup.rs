//! Static code tables consulted by filter validation and dedup keys.
//!
//! Tables are sorted-array constants with binary search. They are small and
//! immutable, so there is no lazy initialization.

/// CAMEO root codes (two digits) and their labels.
const CAMEO_ROOTS: &[(&str, &str)] = &[
    ("01", "Make public statement"),
    ("02", "Appeal"),
    ("03", "Express intent to cooperate"),
    ("04", "Consult"),
    ("05", "Engage in diplomatic cooperation"),
    ("06", "Engage in material cooperation"),
    ("07", "Provide aid"),
    ("08", "Yield"),
    ("09", "Investigate"),
    ("10", "Demand"),
    ("11", "Disapprove"),
    ("12", "Reject"),
    ("13", "Threaten"),
    ("14", "Protest"),
    ("15", "Exhibit force posture"),
    ("16", "Reduce relations"),
    ("17", "Coerce"),
    ("18", "Assault"),
    ("19", "Fight"),
    ("20", "Use unconventional mass violence"),
];

/// FIPS 10-4 country codes as used by GDELT geographies and filters.
const FIPS_COUNTRIES: &[&str] = &[
    "AA", "AC", "AE", "AF", "AG", "AJ", "AL", "AM", "AN", "AO", "AQ", "AR", "AS", "AT", "AU",
    "AV", "AX", "AY", "BA", "BB", "BC", "BD", "BE", "BF", "BG", "BH", "BK", "BL", "BM", "BN",
    "BO", "BP", "BQ", "BR", "BS", "BT", "BU", "BV", "BX", "BY", "CA", "CB", "CD", "CE", "CF",
    "CG", "CH", "CI", "CJ", "CK", "CM", "CN", "CO", "CQ", "CR", "CS", "CT", "CU", "CV", "CW",
    "CY", "DA", "DJ", "DO", "DQ", "DR", "EC", "EG", "EI", "EK", "EN", "ER", "ES", "ET", "EU",
    "EZ", "FG", "FI", "FJ", "FK", "FM", "FO", "FP", "FQ", "FR", "FS", "GA", "GB", "GG", "GH",
    "GI", "GJ", "GK", "GL", "GM", "GO", "GP", "GQ", "GR", "GT", "GV", "GY", "GZ", "HA", "HK",
    "HM", "HO", "HQ", "HR", "HU", "IC", "ID", "IM", "IN", "IO", "IP", "IR", "IS", "IT", "IV",
    "IZ", "JA", "JE", "JM", "JN", "JO", "JQ", "JU", "KE", "KG", "KN", "KQ", "KR", "KS", "KT",
    "KU", "KV", "KZ", "LA", "LE", "LG", "LH", "LI", "LO", "LQ", "LS", "LT", "LU", "LY", "MA",
    "MB", "MC", "MD", "MF", "MG", "MH", "MI", "MJ", "MK", "ML", "MN", "MO", "MP", "MQ", "MR",
    "MT", "MU", "MV", "MX", "MY", "MZ", "NC", "NE", "NF", "NG", "NH", "NI", "NL", "NO", "NP",
    "NR", "NS", "NT", "NU", "NZ", "OD", "PA", "PC", "PE", "PF", "PG", "PK", "PL", "PM", "PO",
    "PP", "PS", "PU", "QA", "RE", "RI", "RM", "RO", "RP", "RQ", "RS", "RW", "SA", "SB", "SC",
    "SE", "SF", "SG", "SH", "SI", "SL", "SM", "SN", "SO", "SP", "ST", "SU", "SV", "SW", "SX",
    "SY", "SZ", "TD", "TE", "TH", "TI", "TK", "TL", "TN", "TO", "TP", "TS", "TT", "TU", "TV",
    "TW", "TX", "TZ", "UC", "UG", "UK", "UP", "US", "UV", "UY", "UZ", "VC", "VE", "VI", "VM",
    "VQ", "VT", "WA", "WE", "WF", "WI", "WQ", "WS", "WZ", "YM", "ZA", "ZI",
];

/// True when `code` is a known CAMEO root (the first two digits of any event
/// code).
pub fn is_valid_cameo_root(code: &str) -> bool {
    CAMEO_ROOTS.binary_search_by(|(root, _)| root.cmp(&code)).is_ok()
}

/// Returns the label for a CAMEO root code.
pub fn cameo_root_label(code: &str) -> Option<&'static str> {
    CAMEO_ROOTS
        .binary_search_by(|(root, _)| root.cmp(&code))
        .ok()
        .map(|idx| CAMEO_ROOTS[idx].1)
}

/// True when `code` is a known FIPS 10-4 country code.
pub fn is_fips_country(code: &str) -> bool {
    FIPS_COUNTRIES.binary_search(&code).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tables_are_sorted() {
        let mut roots: Vec<_> = CAMEO_ROOTS.iter().map(|(c, _)| *c).collect();
        roots.sort_unstable();
        assert_eq!(
            roots,
            CAMEO_ROOTS.iter().map(|(c, _)| *c).collect::<Vec<_>>()
        );

        let mut countries = FIPS_COUNTRIES.to_vec();
        countries.sort_unstable();
        assert_eq!(countries, FIPS_COUNTRIES);
    }

    #[test]
    fn lookups() {
        assert!(is_valid_cameo_root("01"));
        assert!(is_valid_cameo_root("20"));
        assert!(!is_valid_cameo_root("21"));
        assert_eq!(cameo_root_label("14"), Some("Protest"));

        assert!(is_fips_country("US"));
        assert!(is_fips_country("UK"));
        assert!(!is_fips_country("ZZ"));
    }
}
