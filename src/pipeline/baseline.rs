//! Deterministic rule-based extraction.
//!
//! Pattern tables and regexes over a lowercased copy of the listing text.
//! This pass is total and side-effect-free: it is both a hint source for the
//! generative stage and the floor result the request falls back to when
//! every network stage fails. Keyword tables emit values the reference
//! dataset resolves in the exact or alias tier (canonical codes, English
//! names, registered alias spellings); tables are ordered most-specific
//! first because the first hit wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::matching::similarity::fold;
use crate::pipeline::types::{BaselineExtraction, CandidateAttributes};

// ═══════════════════════════════════════════════════════════════════════
// Numeric patterns
// ═══════════════════════════════════════════════════════════════════════

/// `5 tỷ 500 triệu`
static PRICE_COMBO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:tỷ|tỉ|ty\b)\s+(\d{1,3})\s*(?:triệu|trieu\b|tr\b)")
        .expect("price combo regex")
});

/// `5 tỷ`, `5,5 ty`, `2 billion`
static PRICE_BILLION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:tỷ|tỉ|ty\b|billion|bil\b)").expect("price billion regex")
});

/// `900 triệu`, `15 million`, `5 tr`
static PRICE_MILLION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:triệu|trieu\b|million|mil\b|tr\b)")
        .expect("price million regex")
});

/// `5.000.000.000 vnd`, `3500000000đ`
static PRICE_VND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d(?:[\d.,]*\d)?)\s*(?:vnd|vnđ|đồng|dong\b|₫|đ\b)").expect("price vnd regex")
});

/// `80m2`, `80 m²`, `85 sqm`, `90 mét vuông`
static AREA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:m2\b|m²|m\^2|mét vuông|met vuong\b|sqm\b|square met(?:er|re)s?)")
        .expect("area regex")
});

/// `3PN`, `2 phòng ngủ`, `4 bedrooms`
static BEDROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:pn\b|phòng ngủ|phong ngu\b|bedrooms?\b|beds?\b|br\b)")
        .expect("bedroom regex")
});

/// `2WC`, `2 phòng tắm`, `2 bathrooms`
static BATHROOM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:wc\b|vs\b|toilets?\b|phòng tắm|phong tam\b|nhà vệ sinh|nha ve sinh\b|bathrooms?\b|baths?\b)")
        .expect("bathroom regex")
});

/// `4 tầng`, `3 lầu`, `2 storeys`
static FLOOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*(?:tầng|tang\b|lầu|lau\b|floors?\b|storeys?\b|stor(?:y|ies)\b)")
        .expect("floor regex")
});

/// `Q7`, `Q.10`, `quận 3`, `district 2`
static DISTRICT_NUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:quận|quan|district|q\.?)\s*(\d{1,2})\b").expect("district regex")
});

/// `hướng Đông Nam`, `facing south`. Compounds are listed before single
/// cardinals so the longer form wins.
static DIRECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:hướng|huong|facing|direction)\s*:?\s*(đông nam|dong nam|đông bắc|dong bac|tây nam|tay nam|tây bắc|tay bac|south\s?east|north\s?east|south\s?west|north\s?west|đông|dong|tây|tay|nam|bắc|bac|south|north|east|west)",
    )
    .expect("direction regex")
});

// ═══════════════════════════════════════════════════════════════════════
// Keyword tables
// ═══════════════════════════════════════════════════════════════════════

const CITY_KEYWORDS: &[(&str, &str)] = &[
    ("hồ chí minh", "hcmc"),
    ("ho chi minh", "hcmc"),
    ("tphcm", "hcmc"),
    ("tp hcm", "hcmc"),
    ("tp.hcm", "hcmc"),
    ("sài gòn", "hcmc"),
    ("sai gon", "hcmc"),
    ("saigon", "hcmc"),
    ("hcm", "hcmc"),
    ("hà nội", "hanoi"),
    ("ha noi", "hanoi"),
    ("hanoi", "hanoi"),
    ("đà nẵng", "danang"),
    ("da nang", "danang"),
    ("danang", "danang"),
];

/// Named districts not covered by the numbered-district pattern. Emits the
/// registered unaccented alias.
const DISTRICT_KEYWORDS: &[(&str, &str)] = &[
    ("bình thạnh", "binh thanh"),
    ("binh thanh", "binh thanh"),
    ("phú nhuận", "phu nhuan"),
    ("phu nhuan", "phu nhuan"),
    ("tân bình", "tan binh"),
    ("tan binh", "tan binh"),
    ("gò vấp", "go vap"),
    ("go vap", "go vap"),
    ("thủ đức", "thu duc"),
    ("thu duc", "thu duc"),
];

const PROPERTY_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("nhà phố thương mại", "shophouse"),
    ("nha pho thuong mai", "shophouse"),
    ("shophouse", "shophouse"),
    ("shop house", "shophouse"),
    ("căn hộ", "apartment"),
    ("can ho", "apartment"),
    ("chung cư", "apartment"),
    ("chung cu", "apartment"),
    ("apartment", "apartment"),
    ("condo", "apartment"),
    ("nhà phố", "townhouse"),
    ("nha pho", "townhouse"),
    ("townhouse", "townhouse"),
    ("biệt thự", "villa"),
    ("biet thu", "villa"),
    ("villa", "villa"),
    ("đất nền", "land"),
    ("dat nen", "land"),
    ("land plot", "land"),
    ("đất ", "land"),
    ("văn phòng", "office"),
    ("van phong", "office"),
    ("officetel", "office"),
    ("office", "office"),
    ("phòng trọ", "room"),
    ("phong tro", "room"),
    ("room for rent", "room"),
    ("nhà riêng", "house"),
    ("nha rieng", "house"),
    ("house", "house"),
];

const LEGAL_KEYWORDS: &[(&str, &str)] = &[
    ("sổ hồng riêng", "pink_book"),
    ("so hong rieng", "pink_book"),
    ("sổ hồng", "pink_book"),
    ("so hong", "pink_book"),
    ("shr", "pink_book"),
    ("sổ đỏ", "red_book"),
    ("so do", "red_book"),
    ("hợp đồng mua bán", "sale_contract"),
    ("hop dong mua ban", "sale_contract"),
    ("hdmb", "sale_contract"),
    ("đang chờ sổ", "pending_certificate"),
    ("dang cho so", "pending_certificate"),
    ("chờ sổ", "pending_certificate"),
];

const FURNISHING_KEYWORDS: &[(&str, &str)] = &[
    ("nội thất đầy đủ", "fully_furnished"),
    ("noi that day du", "fully_furnished"),
    ("full nội thất", "fully_furnished"),
    ("full noi that", "fully_furnished"),
    ("fully furnished", "fully_furnished"),
    ("full furniture", "fully_furnished"),
    ("nội thất cơ bản", "basic_furnished"),
    ("noi that co ban", "basic_furnished"),
    ("basic furnish", "basic_furnished"),
    ("không nội thất", "unfurnished"),
    ("khong noi that", "unfurnished"),
    ("nhà trống", "unfurnished"),
    ("nha trong", "unfurnished"),
    ("unfurnished", "unfurnished"),
    ("furnished", "fully_furnished"),
];

const AMENITY_KEYWORDS: &[(&str, &str)] = &[
    ("hồ bơi", "pool"),
    ("ho boi", "pool"),
    ("bể bơi", "pool"),
    ("be boi", "pool"),
    ("swimming pool", "pool"),
    ("pool", "pool"),
    ("phòng gym", "gym"),
    ("phong gym", "gym"),
    ("phòng tập", "gym"),
    ("phong tap", "gym"),
    ("fitness", "gym"),
    ("gym", "gym"),
    ("chỗ đậu xe", "parking"),
    ("cho dau xe", "parking"),
    ("bãi đỗ xe", "parking"),
    ("bai do xe", "parking"),
    ("hầm xe", "parking"),
    ("ham xe", "parking"),
    ("parking", "parking"),
    ("ban công", "balcony"),
    ("ban cong", "balcony"),
    ("balcony", "balcony"),
    ("thang máy", "elevator"),
    ("thang may", "elevator"),
    ("elevator", "elevator"),
    ("lift", "elevator"),
    ("sân vườn", "garden"),
    ("san vuon", "garden"),
    ("garden", "garden"),
    ("bảo vệ 24/7", "security"),
    ("bao ve 24/7", "security"),
    ("an ninh 24/7", "security"),
    ("bảo vệ", "security"),
    ("bao ve", "security"),
    ("security", "security"),
    ("khu vui chơi", "playground"),
    ("khu vui choi", "playground"),
    ("playground", "playground"),
    ("sân thượng", "rooftop"),
    ("san thuong", "rooftop"),
    ("rooftop", "rooftop"),
    ("view sông", "river_view"),
    ("view song", "river_view"),
    ("river view", "river_view"),
];

/// English compass compounds and their accented Vietnamese forms are safe
/// without a `hướng`/`facing` prefix; single cardinals are not (`nam` is a
/// name particle, `đông` means crowded).
const BARE_COMPASS: &[(&str, &str)] = &[
    ("southeast", "southeast"),
    ("south east", "southeast"),
    ("northeast", "northeast"),
    ("north east", "northeast"),
    ("southwest", "southwest"),
    ("south west", "southwest"),
    ("northwest", "northwest"),
    ("north west", "northwest"),
    ("đông nam", "southeast"),
    ("đông bắc", "northeast"),
    ("tây nam", "southwest"),
    ("tây bắc", "northwest"),
];

const RENT_SIGNALS: &[&str] = &[
    "cho thuê", "cho thue", "for rent", "for lease", "thuê căn hộ", "thue can ho",
    "/tháng", "/thang", "per month", "/month",
];

const SALE_SIGNALS: &[&str] = &[
    "bán ", "cần bán", "can ban", "ban nha", "ban can ho", "ban gap", "ban dat",
    "for sale", "sale",
];

// ═══════════════════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct BaselineRuleExtractor;

impl BaselineRuleExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> BaselineExtraction {
        let lower = text.to_lowercase();

        let attributes = CandidateAttributes {
            listing_kind: scan_listing_kind(&lower),
            city: scan_table(&lower, CITY_KEYWORDS),
            district: scan_district(&lower),
            property_type: scan_table(&lower, PROPERTY_TYPE_KEYWORDS),
            direction: scan_direction(&lower),
            legal_status: scan_table(&lower, LEGAL_KEYWORDS),
            furnishing: scan_table(&lower, FURNISHING_KEYWORDS),
            amenities: scan_amenities(&lower),
            price_vnd: scan_price(&lower),
            area_m2: scan_area(&lower),
            bedrooms: scan_count(&lower, &BEDROOM_RE),
            bathrooms: scan_count(&lower, &BATHROOM_RE),
            floors: scan_count(&lower, &FLOOR_RE),
        };

        let confidence = baseline_confidence(&attributes);
        BaselineExtraction {
            attributes,
            confidence,
        }
    }
}

/// Confidence grows with the high-value fields the rule pass located.
fn baseline_confidence(attrs: &CandidateAttributes) -> f32 {
    if attrs.is_empty() {
        return 0.05;
    }
    let mut high_value = 0u32;
    if attrs.price_vnd.is_some() {
        high_value += 1;
    }
    if attrs.area_m2.is_some() {
        high_value += 1;
    }
    if attrs.district.is_some() {
        high_value += 1;
    }
    if attrs.property_type.is_some() {
        high_value += 1;
    }
    (0.2 + 0.15 * high_value as f32).min(0.8)
}

fn scan_table(lower: &str, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, code)| (*code).to_string())
}

fn scan_district(lower: &str) -> Option<String> {
    if let Some(caps) = DISTRICT_NUM_RE.captures(lower) {
        return Some(format!("district {}", &caps[1]));
    }
    scan_table(lower, DISTRICT_KEYWORDS)
}

fn scan_direction(lower: &str) -> Option<String> {
    if let Some(caps) = DIRECTION_RE.captures(lower) {
        if let Some(code) = direction_code(&caps[1]) {
            return Some(code.to_string());
        }
    }
    scan_table(lower, BARE_COMPASS)
}

fn direction_code(raw: &str) -> Option<&'static str> {
    let folded = fold(raw);
    Some(match folded.as_str() {
        "dong nam" | "southeast" | "south east" => "southeast",
        "dong bac" | "northeast" | "north east" => "northeast",
        "tay nam" | "southwest" | "south west" => "southwest",
        "tay bac" | "northwest" | "north west" => "northwest",
        "dong" | "east" => "east",
        "tay" | "west" => "west",
        "nam" | "south" => "south",
        "bac" | "north" => "north",
        _ => return None,
    })
}

fn scan_amenities(lower: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (pattern, code) in AMENITY_KEYWORDS {
        if lower.contains(pattern) && !found.iter().any(|c| c == code) {
            found.push((*code).to_string());
        }
    }
    found
}

fn scan_listing_kind(lower: &str) -> Option<String> {
    if RENT_SIGNALS.iter().any(|s| lower.contains(s)) {
        return Some("rent".to_string());
    }
    if SALE_SIGNALS.iter().any(|s| lower.contains(s)) {
        return Some("sale".to_string());
    }
    None
}

fn scan_price(lower: &str) -> Option<f64> {
    if let Some(caps) = PRICE_COMBO_RE.captures(lower) {
        let billions = parse_decimal(&caps[1])?;
        let millions = parse_decimal(&caps[2])?;
        return Some(billions * 1e9 + millions * 1e6);
    }
    if let Some(caps) = PRICE_BILLION_RE.captures(lower) {
        return Some(parse_decimal(&caps[1])? * 1e9);
    }
    if let Some(caps) = PRICE_MILLION_RE.captures(lower) {
        return Some(parse_decimal(&caps[1])? * 1e6);
    }
    if let Some(caps) = PRICE_VND_RE.captures(lower) {
        let value = parse_decimal(&caps[1])?;
        // Plain amounts below a million dong are never listing prices.
        if value >= 1_000_000.0 {
            return Some(value);
        }
    }
    None
}

fn scan_area(lower: &str) -> Option<f64> {
    AREA_RE
        .captures(lower)
        .and_then(|caps| parse_decimal(&caps[1]))
}

fn scan_count(lower: &str, re: &Regex) -> Option<u32> {
    re.captures(lower).and_then(|caps| caps[1].parse().ok())
}

/// Parse a number that may use Vietnamese thousands separators (`5.000.000`)
/// or a decimal comma (`5,5`). Multiple separators always mean thousands; a
/// single separator followed by exactly three digits does too.
fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(' ', "");
    let separators = s.matches(['.', ',']).count();
    let cleaned = match separators {
        0 => s,
        1 => {
            let sep = if s.contains('.') { '.' } else { ',' };
            let (head, tail) = s.split_once(sep)?;
            if tail.len() == 3 && head.len() <= 3 {
                format!("{head}{tail}")
            } else {
                format!("{head}.{tail}")
            }
        }
        _ => s.replace(['.', ','], ""),
    };
    cleaned.parse().ok()
}

// Lenient parsers for short value strings (generative output often returns
// numbers as strings with unit suffixes).

pub(crate) fn parse_price_text(raw: &str) -> Option<f64> {
    let lower = raw.to_lowercase();
    scan_price(&lower).or_else(|| parse_decimal(&lower))
}

pub(crate) fn parse_area_text(raw: &str) -> Option<f64> {
    let lower = raw.to_lowercase();
    scan_area(&lower).or_else(|| parse_decimal(&lower))
}

pub(crate) fn parse_count_text(raw: &str) -> Option<u32> {
    static FIRST_INT: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\d+").expect("integer regex"));
    FIRST_INT
        .find(raw)
        .and_then(|m| m.as_str().parse().ok())
}
