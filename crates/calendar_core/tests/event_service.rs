use calendar_core::{
    CalendarPeriod, CreateEventRequest, EventRepository, EventService, EventServiceError,
    InMemoryEventRepository, SqliteEventRepository, UpdateEventRequest,
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use std::sync::Arc;
use std::thread;

fn memory_service() -> EventService<InMemoryEventRepository> {
    EventService::new(InMemoryEventRepository::new())
}

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn create_request(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateEventRequest {
    CreateEventRequest {
        title: title.to_string(),
        start,
        end,
        description: String::new(),
    }
}

fn update_request(
    id: &str,
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> UpdateEventRequest {
    UpdateEventRequest {
        id: id.to_string(),
        title: title.to_string(),
        start,
        end,
        description: String::new(),
    }
}

#[test]
fn create_then_get_returns_the_same_event() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let mut request = create_request("Meeting", start, start + Duration::hours(1));
    request.description = "weekly sync".to_string();

    let id = service.create(&request).unwrap();
    let view = service.get(&id.to_string()).unwrap();

    assert_eq!(view.id, id.to_string());
    assert_eq!(view.title, "Meeting");
    assert_eq!(view.start, request.start);
    assert_eq!(view.end, request.end);
    assert_eq!(view.description, "weekly sync");
}

#[test]
fn title_length_is_bounded() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let end = start + Duration::hours(1);

    for title in ["ab".to_string(), "x".repeat(51)] {
        let err = service.create(&create_request(&title, start, end)).unwrap_err();
        assert!(matches!(err, EventServiceError::ValidationFailed(_)));
        assert_eq!(err.http_status(), 400);
    }
    for title in ["abc".to_string(), "x".repeat(50), "ééé".to_string()] {
        service
            .create(&create_request(&title, start, end))
            .unwrap();
        service.repository().list_all(None).unwrap().iter().for_each(|e| {
            service.delete(&e.id.to_string()).unwrap();
        });
    }
}

#[test]
fn end_must_follow_start() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);

    for end in [start, start - Duration::minutes(1)] {
        let err = service
            .create(&create_request("Empty slot", start, end))
            .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }
}

#[test]
fn overlapping_create_is_date_busy() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let first = service
        .create(&create_request("First", start, start + Duration::hours(2)))
        .unwrap();

    let cases = [
        (start + Duration::hours(1), start + Duration::hours(3)),
        (start - Duration::hours(1), start + Duration::minutes(1)),
        (start + Duration::minutes(10), start + Duration::minutes(20)),
        (start - Duration::hours(1), start + Duration::hours(5)),
        (start, start + Duration::hours(2)),
    ];
    for (s, e) in cases {
        let err = service.create(&create_request("Second", s, e)).unwrap_err();
        assert!(matches!(err, EventServiceError::DateBusy(id) if id == first));
        assert_eq!(err.http_status(), 409);
    }
    assert_eq!(service.list_all(0).unwrap().len(), 1);
}

#[test]
fn back_to_back_events_are_allowed() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let boundary = start + Duration::hours(1);

    service
        .create(&create_request("Earlier", start, boundary))
        .unwrap();
    service
        .create(&create_request("Later", boundary, boundary + Duration::hours(1)))
        .unwrap();
    assert_eq!(service.list_all(0).unwrap().len(), 2);
}

#[test]
fn update_may_overlap_only_itself() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let own = service
        .create(&create_request("Own", start, start + Duration::hours(2)))
        .unwrap();
    let other = service
        .create(&create_request(
            "Other",
            start + Duration::hours(3),
            start + Duration::hours(4),
        ))
        .unwrap();

    service
        .update(&update_request(
            &own.to_string(),
            "Own moved",
            start + Duration::hours(1),
            start + Duration::hours(3),
        ))
        .unwrap();
    let view = service.get(&own.to_string()).unwrap();
    assert_eq!(view.title, "Own moved");
    assert_eq!(view.start, start + Duration::hours(1));

    let err = service
        .update(&update_request(
            &own.to_string(),
            "Own clash",
            start + Duration::hours(2),
            start + Duration::hours(4),
        ))
        .unwrap_err();
    assert!(matches!(err, EventServiceError::DateBusy(id) if id == other));
    assert_eq!(service.get(&own.to_string()).unwrap().title, "Own moved");
}

#[test]
fn update_reports_bad_or_unknown_ids() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let end = start + Duration::hours(1);

    let err = service
        .update(&update_request("not-a-uuid", "Title", start, end))
        .unwrap_err();
    assert!(matches!(err, EventServiceError::InvalidIdentifier(_)));

    let unknown = calendar_core::EventId::new().to_string();
    let err = service
        .update(&update_request(&unknown, "Title", start, end))
        .unwrap_err();
    assert!(matches!(err, EventServiceError::NotFound(_)));
    assert_eq!(err.http_status(), 404);
}

#[test]
fn delete_then_fetch_is_not_found() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let id = service
        .create(&create_request("Doomed", start, start + Duration::hours(1)))
        .unwrap()
        .to_string();

    service.delete(&id).unwrap();
    assert!(matches!(
        service.get(&id),
        Err(EventServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete(&id),
        Err(EventServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.delete("garbage"),
        Err(EventServiceError::InvalidIdentifier(_))
    ));
}

#[test]
fn list_day_returns_only_that_day() {
    let service = memory_service();
    let day = utc(2020, 1, 1, 0, 0);
    service
        .create(&create_request("Early", day, day + Duration::hours(1)))
        .unwrap();
    service
        .create(&create_request(
            "Evening",
            day + Duration::hours(19),
            day + Duration::hours(22),
        ))
        .unwrap();
    service
        .create(&create_request(
            "Tomorrow",
            day + Duration::hours(24),
            day + Duration::hours(25),
        ))
        .unwrap();

    let titles: Vec<String> = service
        .list_day(&(day + Duration::hours(12)))
        .unwrap()
        .into_iter()
        .map(|view| view.title)
        .collect();
    assert_eq!(titles, vec!["Early", "Evening"]);
}

#[test]
fn list_day_follows_the_anchor_offset() {
    let service = memory_service();
    // 22:00 UTC on Dec 31 is already Jan 1 at +03:00.
    let start = utc(2019, 12, 31, 22, 0);
    service
        .create(&create_request("Toast", start, start + Duration::hours(1)))
        .unwrap();

    let plus3 = FixedOffset::east_opt(3 * 3600).unwrap();
    let local_new_year = plus3.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap();
    assert_eq!(service.list_day(&local_new_year).unwrap().len(), 1);
    assert!(service
        .list_day(&utc(2020, 1, 1, 12, 0))
        .unwrap()
        .is_empty());
}

#[test]
fn week_and_month_listings_partition_time() {
    let service = memory_service();
    // Sunday, end of an ISO week and of a month.
    let sunday = utc(2020, 5, 31, 23, 0);
    let monday = utc(2020, 6, 1, 0, 0);
    let sunday_id = service
        .create(&create_request("Sunday", sunday, sunday + Duration::minutes(30)))
        .unwrap();
    let monday_id = service
        .create(&create_request("Monday", monday, monday + Duration::minutes(30)))
        .unwrap();

    let ids = |views: Vec<calendar_core::EventView>| -> Vec<String> {
        views.into_iter().map(|v| v.id).collect()
    };
    assert_eq!(
        ids(service.list_week(&sunday).unwrap()),
        vec![sunday_id.to_string()]
    );
    assert_eq!(
        ids(service.list_week(&monday).unwrap()),
        vec![monday_id.to_string()]
    );
    assert_eq!(
        ids(service.list_month(&sunday).unwrap()),
        vec![sunday_id.to_string()]
    );
    assert_eq!(
        ids(service.list_month(&monday).unwrap()),
        vec![monday_id.to_string()]
    );
}

fn backed_services() -> Vec<(&'static str, EventService<Box<dyn EventRepository>>)> {
    vec![
        (
            "memory",
            EventService::new(Box::new(InMemoryEventRepository::new()) as Box<dyn EventRepository>),
        ),
        (
            "sqlite",
            EventService::new(
                Box::new(SqliteEventRepository::open_in_memory().unwrap()) as Box<dyn EventRepository>
            ),
        ),
    ]
}

/// 23:59:59.999999999 local time at the given offset.
fn last_nanosecond_of(offset_hours: i32, y: i32, m: u32, d: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(offset_hours * 3600)
        .unwrap()
        .with_ymd_and_hms(y, m, d, 23, 59, 59)
        .unwrap()
        + Duration::nanoseconds(999_999_999)
}

/// One-nanosecond events on each side of a period boundary are each listed
/// by exactly the period that contains them.
fn assert_boundary_split(period: CalendarPeriod, last: DateTime<FixedOffset>) {
    let next = last + Duration::nanoseconds(1);
    for (name, service) in backed_services() {
        let label = format!("{name} {} {}", period.as_str(), last.to_rfc3339());
        let tail = service
            .create(&create_request(
                "Tail",
                last.with_timezone(&Utc),
                next.with_timezone(&Utc),
            ))
            .unwrap()
            .to_string();
        let head = service
            .create(&create_request(
                "Head",
                next.with_timezone(&Utc),
                (next + Duration::nanoseconds(1)).with_timezone(&Utc),
            ))
            .unwrap()
            .to_string();

        let ids = |anchor: &DateTime<FixedOffset>| -> Vec<String> {
            service
                .list_period(period, anchor)
                .unwrap()
                .into_iter()
                .map(|view| view.id)
                .collect()
        };
        assert_eq!(ids(&last), vec![tail], "{label}");
        assert_eq!(ids(&next), vec![head], "{label}");
    }
}

#[test]
fn last_nanosecond_of_day_is_listed_once() {
    assert_boundary_split(CalendarPeriod::Day, last_nanosecond_of(0, 2020, 1, 1));
    assert_boundary_split(CalendarPeriod::Day, last_nanosecond_of(3, 2020, 1, 1));
}

#[test]
fn last_nanosecond_of_week_is_listed_once() {
    // 2020-01-05 is a Sunday.
    assert_boundary_split(CalendarPeriod::Week, last_nanosecond_of(0, 2020, 1, 5));
    assert_boundary_split(CalendarPeriod::Week, last_nanosecond_of(3, 2020, 1, 5));
}

#[test]
fn last_nanosecond_of_month_is_listed_once() {
    assert_boundary_split(CalendarPeriod::Month, last_nanosecond_of(0, 2020, 1, 31));
    assert_boundary_split(CalendarPeriod::Month, last_nanosecond_of(3, 2020, 1, 31));
    assert_boundary_split(CalendarPeriod::Month, last_nanosecond_of(3, 2020, 12, 31));
}

#[test]
fn ids_with_surrounding_whitespace_are_invalid() {
    let service = memory_service();
    let start = utc(2020, 1, 1, 10, 0);
    let id = service
        .create(&create_request("Padded", start, start + Duration::hours(1)))
        .unwrap();
    let padded = format!(" {id} ");

    assert!(matches!(
        service.get(&padded),
        Err(EventServiceError::InvalidIdentifier(_))
    ));
    assert!(matches!(
        service.delete(&padded),
        Err(EventServiceError::InvalidIdentifier(_))
    ));
    assert!(service.get(&id.to_string()).is_ok());
}

#[test]
fn list_all_pages_with_configured_size() {
    let service = EventService::with_page_size(InMemoryEventRepository::new(), 2);
    let base = utc(2020, 3, 1, 8, 0);
    for i in 0..5 {
        let start = base + Duration::hours(i);
        service
            .create(&create_request("Slot", start, start + Duration::minutes(30)))
            .unwrap();
    }

    assert_eq!(service.page_size(), 2);
    assert_eq!(service.list_all(0).unwrap().len(), 2);
    assert_eq!(service.list_all(2).unwrap().len(), 1);
    assert!(service.list_all(3).unwrap().is_empty());
    assert_eq!(memory_service().page_size(), 25);
}

#[test]
fn service_works_over_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let service = EventService::new(
        SqliteEventRepository::open(dir.path().join("service.sqlite3")).unwrap(),
    );
    let start = utc(2020, 1, 1, 10, 0);
    let id = service
        .create(&create_request("Stored", start, start + Duration::hours(1)))
        .unwrap();
    assert!(matches!(
        service.create(&create_request(
            "Clash",
            start + Duration::minutes(30),
            start + Duration::hours(2)
        )),
        Err(EventServiceError::DateBusy(conflict)) if conflict == id
    ));
    assert_eq!(service.list_day(&start).unwrap().len(), 1);
}

fn race_for_one_slot<R: EventRepository + 'static>(repo: R) {
    let service = Arc::new(EventService::new(repo));
    let start = utc(2020, 1, 1, 10, 0);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let offset = Duration::minutes(i);
                service.create(&create_request(
                    "Racer",
                    start + offset,
                    start + offset + Duration::hours(1),
                ))
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| matches!(err, EventServiceError::DateBusy(_))));

    let stored = service.list_all(0).unwrap();
    assert_eq!(stored.len(), 1);
}

#[test]
fn concurrent_creates_never_double_book_in_memory() {
    race_for_one_slot(InMemoryEventRepository::new());
}

#[test]
fn concurrent_creates_never_double_book_in_sqlite() {
    race_for_one_slot(SqliteEventRepository::open_in_memory().unwrap());
}
