use chrono::{DateTime, Duration, TimeZone, Utc};
use nursery_dashboard::history::{window, LiveHistory, LIVE_HISTORY_LEN};
use nursery_dashboard::models::*;
use nursery_dashboard::password::{
    passwords_match, validate_new_password, PasswordError, PasswordStrength, StrengthReport,
};
use speculate2::speculate;

fn record(key: &str, timestamp: DateTime<Utc>) -> (String, HistoryPoint) {
    (
        key.to_string(),
        HistoryPoint {
            timestamp,
            temperature: Some(20.0),
            humidity: None,
            moisture: None,
            rain: None,
        },
    )
}

fn keys(entries: &[HistoryEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.key.as_str()).collect()
}

speculate! {
    describe "password strength" {
        it "scores a short lowercase password as weak" {
            let strength = PasswordStrength::score("abc");
            assert_eq!(strength.value(), 1);
            assert_eq!(strength.label(), "Weak");
            assert_eq!(strength.color(), "bg-red-500");
        }

        it "scores a password meeting every rule as strong" {
            let strength = PasswordStrength::score("Abcdef12!");
            assert_eq!(strength.value(), 5);
            assert_eq!(strength.label(), "Strong");
            assert_eq!(strength.color(), "bg-green-500");
        }

        it "gives an empty password no label" {
            let strength = PasswordStrength::score("");
            assert_eq!(strength.value(), 0);
            assert_eq!(strength.label(), "");
            assert_eq!(strength.color(), "bg-gray-200");
        }

        it "labels three and four rules as medium" {
            assert_eq!(PasswordStrength::score("abcdefgh1").label(), "Medium");
            assert_eq!(PasswordStrength::score("Abcdefgh1").label(), "Medium");
            assert_eq!(PasswordStrength::score("Abcdefgh1").color(), "bg-yellow-500");
        }

        it "counts spaces as symbols" {
            assert_eq!(PasswordStrength::score("a b").value(), 2);
        }

        it "accepts only scores above two" {
            assert!(!PasswordStrength::score("abcdefgh").is_acceptable());
            assert!(PasswordStrength::score("abcdefg1").is_acceptable());
        }
    }

    describe "password confirmation" {
        it "matches identical strings only" {
            assert!(passwords_match("Abcdef12!", "Abcdef12!"));
            assert!(!passwords_match("Abcdef12!", "abcdef12!"));
        }

        it "reports a mismatch before weakness" {
            assert_eq!(validate_new_password("abc", "abd"), Err(PasswordError::Mismatch));
        }

        it "rejects a matching weak password" {
            assert_eq!(
                validate_new_password("abcdefgh", "abcdefgh"),
                Err(PasswordError::TooWeak)
            );
        }

        it "accepts a matching medium password" {
            assert_eq!(validate_new_password("abcdefg1", "abcdefg1"), Ok(()));
        }

        it "leaves the match unknown until a confirmation is typed" {
            let report = StrengthReport::evaluate("Abcdef12!", Some(""));
            assert_eq!(report.matches, None);
            assert_eq!(report.max_score, 5);
        }
    }

    describe "history window" {
        before {
            let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        }

        it "keeps the last day by default" {
            let records = vec![
                record("-a", now - Duration::hours(25)),
                record("-b", now - Duration::hours(23)),
            ];

            let entries = window(records, TimeRange::default(), now);

            assert_eq!(keys(&entries), vec!["-b"]);
        }

        it "includes a record exactly on the boundary" {
            let records = vec![record("-a", now - Duration::days(7))];

            assert_eq!(window(records, TimeRange::Week, now).len(), 1);
        }

        it "goes back one calendar month" {
            let records = vec![
                record("-a", Utc.with_ymd_and_hms(2025, 2, 28, 11, 59, 0).unwrap()),
                record("-b", Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap()),
                record("-c", Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()),
            ];

            let entries = window(records, TimeRange::Month, now);

            assert_eq!(keys(&entries), vec!["-b", "-c"]);
        }

        it "orders entries by key rather than timestamp" {
            let records = vec![
                record("-c", now - Duration::hours(3)),
                record("-a", now - Duration::hours(1)),
                record("-b", now - Duration::hours(2)),
            ];

            let entries = window(records, TimeRange::Day, now);

            assert_eq!(keys(&entries), vec!["-a", "-b", "-c"]);
        }
    }

    describe "time ranges" {
        it "parses range names" {
            assert_eq!(TimeRange::from_str("week"), Some(TimeRange::Week));
            assert_eq!(TimeRange::from_str("year"), None);
            assert_eq!(TimeRange::Month.as_str(), "month");
        }
    }

    describe "live history" {
        it "keeps the newest points" {
            let mut live = LiveHistory::new();
            let at = Utc::now();
            for t in 0..(LIVE_HISTORY_LEN + 3) {
                let reading = SensorReading {
                    temperature: Some(t as f64),
                    ..Default::default()
                };
                live.push(&reading, at);
            }

            let points = live.points();
            assert_eq!(points.len(), LIVE_HISTORY_LEN);
            assert_eq!(points[0].temperature, 3.0);
            assert_eq!(points[LIVE_HISTORY_LEN - 1].temperature, 9.0);
        }

        it "charts missing fields as zero" {
            let mut live = LiveHistory::new();
            let point = live.push(&SensorReading::default(), Utc::now()).clone();

            assert_eq!(point.humidity, 0.0);
            assert_eq!(point.time.len(), 5);
        }
    }

    describe "control toggles" {
        it "turns manual mode on by itself" {
            let change = ControlState::default().toggled(Control::ManualMode).unwrap();
            assert_eq!(change.fields, vec![("isManualModeOn", true)]);
        }

        it "resets the actuators when manual mode turns off" {
            let state = ControlState {
                is_manual_mode_on: true,
                is_water_pump_on: true,
                is_roof_open: true,
            };

            let change = state.toggled(Control::ManualMode).unwrap();

            let mut next = state;
            next.apply(&change);
            assert_eq!(next, ControlState::default());
        }

        it "refuses actuator changes in auto mode" {
            let state = ControlState::default();
            assert!(state.toggled(Control::WaterPump).is_err());
            assert!(state.toggled(Control::Roof).is_err());
        }

        it "flips one actuator in manual mode" {
            let state = ControlState {
                is_manual_mode_on: true,
                ..Default::default()
            };

            let change = state.toggled(Control::WaterPump).unwrap();

            assert_eq!(change.fields, vec![("isWaterPumpOn", true)]);
        }
    }

    describe "sensor display" {
        it "formats temperature with one decimal" {
            let reading = SensorReading {
                temperature: Some(24.46),
                ..Default::default()
            };
            assert_eq!(reading.temperature_display(), "24.5°C");
        }

        it "rounds temperature halves away from zero" {
            let at = |t: f64| SensorReading {
                temperature: Some(t),
                ..Default::default()
            };
            assert_eq!(at(24.25).temperature_display(), "24.3°C");
            assert_eq!(at(24.75).temperature_display(), "24.8°C");
            assert_eq!(at(0.25).temperature_display(), "0.3°C");
        }

        it "shows N/A for missing fields" {
            assert_eq!(SensorReading::default().rain_display(), "N/A");
        }

        it "keeps reported precision for percentages" {
            assert_eq!(percent_display(Some(62.5)), "62.5%");
            assert_eq!(percent_display(Some(65.0)), "65%");
        }
    }
}
