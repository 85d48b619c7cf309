//! Markdown offer letters.

use chrono::NaiveDate;

pub struct OfferLetter<'a> {
    pub candidate_name: &'a str,
    pub designation: &'a str,
    pub department: &'a str,
    pub location: &'a str,
    pub salary: i64,
    pub currency: &'a str,
    pub joining_date: NaiveDate,
    pub notes: Option<&'a str>,
    pub issued_on: NaiveDate,
}

/// Groups digits in threes: `1250000` → `1,250,000`.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

pub fn render_offer_letter(letter: &OfferLetter) -> String {
    let mut out = String::new();
    out.push_str("# Offer of Employment\n\n");
    out.push_str(&format!("Date: {}\n\n", letter.issued_on.format("%d %B %Y")));
    out.push_str(&format!("Dear {},\n\n", letter.candidate_name));
    out.push_str(&format!(
        "We are pleased to offer you the position of **{}** in our {} department, based in {}.\n\n",
        letter.designation, letter.department, letter.location
    ));
    out.push_str("## Terms\n\n");
    out.push_str(&format!(
        "- Annual compensation: {} {}\n",
        letter.currency,
        format_amount(letter.salary)
    ));
    out.push_str(&format!(
        "- Joining date: {}\n",
        letter.joining_date.format("%d %B %Y")
    ));
    if let Some(notes) = letter.notes.map(str::trim).filter(|n| !n.is_empty()) {
        out.push_str("\n## Additional terms\n\n");
        out.push_str(notes);
        out.push('\n');
    }
    out.push_str(
        "\nPlease confirm your acceptance through the careers portal. \
         This offer is subject to verification of the documents requested during onboarding.\n\n",
    );
    out.push_str("Sincerely,\n\nHuman Resources\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_letter(notes: Option<&'static str>) -> OfferLetter<'static> {
        OfferLetter {
            candidate_name: "Ana Lima",
            designation: "Backend Engineer",
            department: "Engineering",
            location: "Pune",
            salary: 1_850_000,
            currency: "INR",
            joining_date: NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(),
            notes,
            issued_on: NaiveDate::from_ymd_opt(2029, 12, 1).unwrap(),
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1000), "1,000");
        assert_eq!(format_amount(1_850_000), "1,850,000");
        assert_eq!(format_amount(-12_345), "-12,345");
    }

    #[test]
    fn test_letter_contains_terms() {
        let text = render_offer_letter(&make_letter(None));
        assert!(text.starts_with("# Offer of Employment"));
        assert!(text.contains("Dear Ana Lima,"));
        assert!(text.contains("**Backend Engineer**"));
        assert!(text.contains("INR 1,850,000"));
        assert!(text.contains("15 January 2030"));
        assert!(!text.contains("Additional terms"));
    }

    #[test]
    fn test_letter_includes_notes() {
        let text = render_offer_letter(&make_letter(Some("Relocation bonus of 100,000.")));
        assert!(text.contains("## Additional terms\n\nRelocation bonus"));
    }
}
