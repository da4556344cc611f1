use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Verse {
    pub arabic: &'static str,
    pub translation: &'static str,
    pub reference: &'static str,
}

pub const DAILY_VERSES: [Verse; 7] = [
    Verse {
        arabic: "فَإِنَّ مَعَ ٱلْعُسْرِ يُسْرًا",
        translation: "For indeed, with hardship [will be] ease.",
        reference: "Surah Ash-Sharh 94:5",
    },
    Verse {
        arabic: "اللَّهُ نُورُ السَّمَاوَاتِ وَالْأَرْضِ",
        translation: "Allah is the Light of the heavens and the earth.",
        reference: "Surah An-Nur 24:35",
    },
    Verse {
        arabic: "وَإِذَا سَأَلَكَ عِبَادِي عَنِّي فَإِنِّي قَرِيبٌ",
        translation: "And when My servants ask you concerning Me, indeed I am near.",
        reference: "Surah Al-Baqarah 2:186",
    },
    Verse {
        arabic: "إِنَّ اللَّهَ مَعَ الصَّابِرِينَ",
        translation: "Indeed, Allah is with the patient.",
        reference: "Surah Al-Baqarah 2:153",
    },
    Verse {
        arabic: "وَمَا تَوْفِيقِي إِلَّا بِاللَّهِ",
        translation: "And my success is not but through Allah.",
        reference: "Surah Hud 11:88",
    },
    Verse {
        arabic: "رَبَّنَا آتِنَا فِي الدُّنْيَا حَسَنَةً وَفِي الآخِرَةِ حَسَنَةً",
        translation: "Our Lord, give us in this world [that which is] good and in the Hereafter [that which is] good.",
        reference: "Surah Al-Baqarah 2:201",
    },
    Verse {
        arabic: "وَاللَّهُ يَرْزُقُ مَن يَشَاءُ بِغَيْرِ حِسَابٍ",
        translation: "And Allah gives provision to whom He wills without account.",
        reference: "Surah Al-Baqarah 2:212",
    },
];

/// Verse of the day, rotating by day of year.
pub fn daily_verse(date: NaiveDate) -> Verse {
    DAILY_VERSES[date.ordinal() as usize % DAILY_VERSES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_by_day_of_year() {
        let first = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        let next = NaiveDate::from_ymd_opt(2026, 1, 2).expect("valid date");
        let week_later = NaiveDate::from_ymd_opt(2026, 1, 8).expect("valid date");

        assert_eq!(daily_verse(first), DAILY_VERSES[1]);
        assert_eq!(daily_verse(next), DAILY_VERSES[2]);
        assert_eq!(daily_verse(week_later), daily_verse(first));
    }
}
