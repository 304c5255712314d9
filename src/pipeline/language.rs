//! Lightweight language detection for listing text.
//!
//! Classifies Vietnamese vs English using keyword frequency and diacritic
//! density. No model, no network; heuristic scoring is enough because the
//! closed set has two members and downstream stages tolerate a wrong guess
//! (matching still sees canonical codes and English names).

use unicode_normalization::UnicodeNormalization;

use crate::models::enums::Language;

/// Vietnamese indicator patterns, including the unaccented spellings common
/// in casually typed listings.
const VI_INDICATORS: &[&str] = &[
    "bán ", "mua ", "cho thuê", "căn hộ", "nhà phố", "biệt thự", "chung cư",
    "phòng ngủ", "quận ", "phường ", "đường ", "tầng ", "giá ", "tỷ", "triệu",
    "mét vuông", "diện tích", "mặt tiền", "hướng ", "sổ đỏ", "sổ hồng",
    "nội thất", "chính chủ", "gần ", "đầy đủ", "thang máy", "hồ bơi", "hẻm ",
    // unaccented variants
    "ban nha", "cho thue", "can ho", "chung cu", "phong ngu", "quan ",
    "gia ", " ty", " trieu", "met vuong", "so do", "so hong", "mat tien",
    "chinh chu", "noi that", "dien tich",
];

/// English indicator patterns rarely found in Vietnamese listing text.
const EN_INDICATORS: &[&str] = &[
    "the ", "for sale", "for rent", "apartment", "house", "villa",
    "bedroom", "bathroom", "district ", "street ", "price", "billion",
    "million", "square meter", "sqm", "furnished", "located", "near ",
    "with ", "and ", "floor", "view", "spacious", "modern", "property",
    "this ", "close to", "storey",
];

/// Detect the primary language of listing text.
///
/// Short input (fewer than 20 characters) carries too little signal and
/// returns the configured fallback; ties also favor the fallback. Never
/// fails.
pub fn detect_language(text: &str, fallback: Language) -> Language {
    if text.trim().chars().count() < 20 {
        return fallback;
    }

    let lower = text.to_lowercase();

    let vi_score = count_indicators(&lower, VI_INDICATORS) + count_diacritics(&lower);
    let en_score = count_indicators(&lower, EN_INDICATORS);

    let (other, other_score, fallback_score) = match fallback {
        Language::Vi => (Language::En, en_score, vi_score),
        Language::En => (Language::Vi, vi_score, en_score),
    };

    if other_score > fallback_score {
        other
    } else {
        fallback
    }
}

/// Count how many indicator patterns occur in the text.
fn count_indicators(lower_text: &str, indicators: &[&str]) -> u32 {
    let mut score = 0u32;
    for &indicator in indicators {
        score += lower_text.matches(indicator).count() as u32;
    }
    score
}

/// Count diacritic-bearing Latin letters as a Vietnamese signal. Any letter
/// that decomposes to an ASCII base (ạ, ế, ơ, ...) plus đ counts; English
/// listing text has essentially none.
fn count_diacritics(lower_text: &str) -> u32 {
    let mut count = 0u32;
    for ch in lower_text.chars() {
        if ch == 'đ' {
            count += 1;
            continue;
        }
        if ch.is_alphabetic() && !ch.is_ascii() {
            let mut decomposed = ch.nfd();
            if decomposed.next().is_some_and(|base| base.is_ascii_alphabetic()) {
                count += 1;
            }
        }
    }
    // Two diacritics per point keeps one accented word from dominating.
    count / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_vietnamese_listing() {
        let text = "Bán căn hộ 2PN Quận 7, giá 5 tỷ, nội thất đầy đủ";
        assert_eq!(detect_language(text, Language::Vi), Language::Vi);
        assert_eq!(detect_language(text, Language::En), Language::Vi);
    }

    #[test]
    fn detects_english_listing() {
        let text = "Spacious apartment for rent in District 7 with full furniture and city view";
        assert_eq!(detect_language(text, Language::Vi), Language::En);
        assert_eq!(detect_language(text, Language::En), Language::En);
    }

    #[test]
    fn detects_unaccented_vietnamese() {
        let text = "ban nha quan 7 gia 5 ty chinh chu";
        assert_eq!(detect_language(text, Language::Vi), Language::Vi);
    }

    #[test]
    fn short_text_returns_fallback() {
        assert_eq!(detect_language("Quận 7", Language::Vi), Language::Vi);
        assert_eq!(detect_language("Quận 7", Language::En), Language::En);
        assert_eq!(detect_language("", Language::Vi), Language::Vi);
        assert_eq!(detect_language("    ", Language::En), Language::En);
    }

    #[test]
    fn no_signal_returns_fallback() {
        let digits = "0123456789 0123456789 0123456789";
        assert_eq!(detect_language(digits, Language::Vi), Language::Vi);
        assert_eq!(detect_language(digits, Language::En), Language::En);
    }

    #[test]
    fn diacritics_alone_indicate_vietnamese() {
        let text = "Thảo Điền, Bình Thạnh, Phú Mỹ Hưng địa điểm đẹp";
        assert_eq!(detect_language(text, Language::En), Language::Vi);
    }

    #[test]
    fn heavily_english_not_misdetected() {
        let text = "This modern property is located near the river and the new bridge. \
                    The price includes all furniture and the apartment has a great view.";
        assert_eq!(detect_language(text, Language::Vi), Language::En);
    }

    #[test]
    fn count_indicators_basic() {
        let score = count_indicators("bán căn hộ gần quận 7", VI_INDICATORS);
        assert!(score >= 3, "expected bán/căn hộ/gần/quận to match, got {score}");
    }

    #[test]
    fn diacritic_density_counts_pairs() {
        // ậ ì ạ đ ẹ á → 6 accented letters → 3 points
        assert_eq!(count_diacritics("quận bình thạnh đẹp quá"), 3);
        assert_eq!(count_diacritics("plain ascii text"), 0);
    }
}
