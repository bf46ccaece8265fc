use image::Rgb;

/// Fingerspelling letters by class index; J and Z need motion and are not collected
pub const LETTERS: [&str; 24] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "K", "L", "M", "N", "O", "P", "Q", "R", "S",
    "T", "U", "V", "W", "X", "Y",
];

/// Shown for classes outside the letter table
pub const UNKNOWN_LABEL: &str = "?";

/// Box and text colour for letters without an entry
pub const FALLBACK_COLOR: Rgb<u8> = Rgb([150, 150, 150]);

/// Letter for a model class name such as `"3"`
pub fn letter_for_class(class: &str) -> &'static str {
    class
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|index| LETTERS.get(index).copied())
        .unwrap_or(UNKNOWN_LABEL)
}

pub fn color_for_letter(letter: &str) -> Rgb<u8> {
    let rgb = match letter {
        "A" => [0, 255, 0],
        "B" => [0, 0, 255],
        "C" => [255, 0, 0],
        "D" => [0, 255, 255],
        "E" => [255, 255, 0],
        "F" => [255, 0, 255],
        "G" => [0, 128, 255],
        "H" => [0, 255, 128],
        "I" => [255, 128, 0],
        "K" => [255, 0, 128],
        "L" => [255, 128, 255],
        "M" => [0, 128, 128],
        "N" => [128, 128, 0],
        "O" => [128, 0, 128],
        "P" => [255, 255, 255],
        "Q" => [0, 0, 0],
        "R" => [192, 192, 192],
        "S" => [128, 128, 128],
        "T" => [128, 0, 255],
        "U" => [128, 255, 0],
        "V" => [255, 255, 128],
        "W" => [128, 128, 255],
        "X" => [0, 0, 128],
        "Y" => [128, 0, 0],
        _ => return FALLBACK_COLOR,
    };
    Rgb(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_skip_j_and_z() {
        assert_eq!(letter_for_class("0"), "A");
        assert_eq!(letter_for_class("8"), "I");
        assert_eq!(letter_for_class("9"), "K");
        assert_eq!(letter_for_class("23"), "Y");
    }

    #[test]
    fn test_unknown_classes() {
        assert_eq!(letter_for_class("24"), UNKNOWN_LABEL);
        assert_eq!(letter_for_class("left"), UNKNOWN_LABEL);
        assert_eq!(letter_for_class("-1"), UNKNOWN_LABEL);
    }

    #[test]
    fn test_colors() {
        assert_eq!(color_for_letter("A"), Rgb([0, 255, 0]));
        assert_eq!(color_for_letter("B"), Rgb([0, 0, 255]));
        assert_eq!(color_for_letter(UNKNOWN_LABEL), FALLBACK_COLOR);
        for letter in LETTERS {
            assert_ne!(color_for_letter(letter), FALLBACK_COLOR, "{}", letter);
        }
    }
}
