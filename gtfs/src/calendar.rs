use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{ServiceID, Trip};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Calendar {
    pub services: BTreeMap<ServiceID, Service>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Service {
    pub service_id: ServiceID,
    pub days_of_week: DaysOfWeek,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    pub extra_days: BTreeSet<NaiveDate>,
    pub removed_days: BTreeSet<NaiveDate>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DaysOfWeek {
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
    pub sunday: bool,
}

impl Calendar {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Every date some service could possibly run, from the earliest start to the latest end.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut first: Option<NaiveDate> = None;
        let mut last: Option<NaiveDate> = None;
        for service in self.services.values() {
            let start = service
                .extra_days
                .iter()
                .next()
                .map_or(service.start_date, |x| (*x).min(service.start_date));
            let end = service
                .extra_days
                .iter()
                .next_back()
                .map_or(service.end_date, |x| (*x).max(service.end_date));
            first = Some(first.map_or(start, |x| x.min(start)));
            last = Some(last.map_or(end, |x| x.max(end)));
        }
        Some((first?, last?))
    }

    /// Finds the date with the most scheduled trips, breaking ties by the earliest date. Returns
    /// that date and the services running on it.
    pub fn busiest_date(&self, trips: &[Trip]) -> Option<(NaiveDate, BTreeSet<ServiceID>)> {
        let mut trips_per_service: BTreeMap<&ServiceID, usize> = BTreeMap::new();
        for trip in trips {
            *trips_per_service.entry(&trip.service_id).or_insert(0) += 1;
        }

        let (first, last) = self.date_range()?;
        let mut best: Option<(NaiveDate, usize)> = None;
        let mut day = first;
        while day <= last {
            let count: usize = self
                .services
                .values()
                .filter(|service| service.runs_on(&day))
                .map(|service| {
                    trips_per_service
                        .get(&service.service_id)
                        .cloned()
                        .unwrap_or(0)
                })
                .sum();
            if best.map_or(true, |(_, max)| count > max) {
                best = Some((day, count));
            }
            day += Duration::days(1);
        }

        let (day, _) = best?;
        Some((day, self.services_on(&day)))
    }

    pub fn services_on(&self, day: &NaiveDate) -> BTreeSet<ServiceID> {
        self.services
            .values()
            .filter(|service| service.runs_on(day))
            .map(|service| service.service_id.clone())
            .collect()
    }
}

impl Service {
    pub fn runs_on(&self, day: &NaiveDate) -> bool {
        if self.extra_days.contains(day) {
            return true;
        }
        if self.removed_days.contains(day) {
            return false;
        }
        if day < &self.start_date || day > &self.end_date {
            return false;
        }
        self.days_of_week.includes(day)
    }

    /// How many days over the whole calendar this service runs.
    pub fn count_active_days(&self) -> usize {
        let mut count = self
            .extra_days
            .iter()
            .filter(|day| {
                // Extra days inside the regular range that would run anyway are counted below
                !(**day >= self.start_date
                    && **day <= self.end_date
                    && self.days_of_week.includes(day)
                    && !self.removed_days.contains(day))
            })
            .count();
        let mut day = self.start_date;
        while day <= self.end_date {
            if self.days_of_week.includes(&day) && !self.removed_days.contains(&day) {
                count += 1;
            }
            day += Duration::days(1);
        }
        count
    }
}

impl DaysOfWeek {
    pub fn includes(&self, day: &NaiveDate) -> bool {
        match day.weekday() {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<Calendar> {
    let mut calendar = Calendar::default();
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: Record = rec?;
        if calendar.services.contains_key(&rec.service_id) {
            bail!("Duplicate {:?}", rec.service_id);
        }
        calendar.services.insert(
            rec.service_id.clone(),
            Service {
                service_id: rec.service_id,
                days_of_week: DaysOfWeek {
                    monday: rec.monday,
                    tuesday: rec.tuesday,
                    wednesday: rec.wednesday,
                    thursday: rec.thursday,
                    friday: rec.friday,
                    saturday: rec.saturday,
                    sunday: rec.sunday,
                },
                start_date: parse_date(&rec.start_date)?,
                end_date: parse_date(&rec.end_date)?,

                extra_days: BTreeSet::new(),
                removed_days: BTreeSet::new(),
            },
        );
    }
    Ok(calendar)
}

/// calendar_dates.txt may be used alone, without calendar.txt. Services only mentioned here get
/// no regular weekly pattern.
pub fn load_exceptions<R: std::io::Read>(calendar: &mut Calendar, reader: R) -> Result<()> {
    for rec in crate::csv_reader(reader).deserialize() {
        let rec: DateRecord = rec?;
        let date = parse_date(&rec.date)?;
        let service = calendar
            .services
            .entry(rec.service_id.clone())
            .or_insert_with(|| Service {
                service_id: rec.service_id.clone(),
                days_of_week: DaysOfWeek::default(),
                start_date: date,
                end_date: date,
                extra_days: BTreeSet::new(),
                removed_days: BTreeSet::new(),
            });
        if rec.exception_type == 1 {
            service.extra_days.insert(date);
        } else if rec.exception_type == 2 {
            service.removed_days.insert(date);
        } else {
            bail!("Unknown exception_type {}", rec.exception_type);
        }
    }
    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|err| anyhow!("Bad date {raw:?}: {err}"))
}

#[derive(Deserialize)]
struct Record {
    service_id: ServiceID,
    #[serde(deserialize_with = "parse_bool")]
    monday: bool,
    #[serde(deserialize_with = "parse_bool")]
    tuesday: bool,
    #[serde(deserialize_with = "parse_bool")]
    wednesday: bool,
    #[serde(deserialize_with = "parse_bool")]
    thursday: bool,
    #[serde(deserialize_with = "parse_bool")]
    friday: bool,
    #[serde(deserialize_with = "parse_bool")]
    saturday: bool,
    #[serde(deserialize_with = "parse_bool")]
    sunday: bool,
    start_date: String,
    end_date: String,
}

fn parse_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let n = <u8>::deserialize(d)?;
    if n == 1 {
        return Ok(true);
    }
    if n == 0 {
        return Ok(false);
    }
    Err(serde::de::Error::custom(format!("Unknown bool value {n}")))
}

#[derive(Deserialize)]
struct DateRecord {
    service_id: ServiceID,
    date: String,
    exception_type: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekdays(start: NaiveDate, end: NaiveDate) -> Service {
        Service {
            service_id: ServiceID::new("weekday"),
            days_of_week: DaysOfWeek {
                monday: true,
                tuesday: true,
                wednesday: true,
                thursday: true,
                friday: true,
                saturday: false,
                sunday: false,
            },
            start_date: start,
            end_date: end,
            extra_days: BTreeSet::new(),
            removed_days: BTreeSet::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn exceptions_override_weekly_pattern() {
        // 2024-01-01 is a Monday
        let mut service = weekdays(date(2024, 1, 1), date(2024, 1, 7));
        service.removed_days.insert(date(2024, 1, 2));
        service.extra_days.insert(date(2024, 1, 6));
        assert!(service.runs_on(&date(2024, 1, 1)));
        assert!(!service.runs_on(&date(2024, 1, 2)));
        assert!(service.runs_on(&date(2024, 1, 6)));
        assert!(!service.runs_on(&date(2024, 1, 7)));
        assert!(!service.runs_on(&date(2024, 1, 8)));
        assert_eq!(service.count_active_days(), 5);
    }
}
