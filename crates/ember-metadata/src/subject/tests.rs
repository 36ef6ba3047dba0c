use super::*;
use pretty_assertions::assert_eq;

#[derive(Default)]
struct Recorder {
    updates: Mutex<Vec<Uuid>>,
}

impl Observer for Recorder {
    fn update(&self, subject: Uuid) {
        self.updates.lock().push(subject);
    }
}

fn recorder() -> (Arc<Recorder>, Arc<dyn Observer>) {
    let recorder = Arc::new(Recorder::default());
    let observer: Arc<dyn Observer> = recorder.clone();
    (recorder, observer)
}

#[test]
fn test_notify_reaches_attached_observer() {
    let subject = Subject::new(Uuid::new_v4());
    let (rec, observer) = recorder();
    subject.attach(&observer);
    subject.attach(&observer);

    subject.notify();
    assert_eq!(*rec.updates.lock(), vec![subject.id()]);
}

#[test]
fn test_locker_coalesces_notifications() {
    let subject = Subject::new(Uuid::new_v4());
    let (rec, observer) = recorder();
    subject.attach(&observer);

    {
        let _outer = SubjectLocker::new(&subject);
        subject.notify();
        {
            let _inner = SubjectLocker::new(&subject);
            subject.notify();
        }
        subject.notify();
        assert!(rec.updates.lock().is_empty());
        assert!(subject.is_locked());
    }

    assert_eq!(rec.updates.lock().len(), 1);
    assert!(!subject.is_locked());
}

#[test]
fn test_unlock_without_pending_notification_is_silent() {
    let subject = Subject::new(Uuid::new_v4());
    let (rec, observer) = recorder();
    subject.attach(&observer);

    drop(SubjectLocker::new(&subject));
    assert!(rec.updates.lock().is_empty());
}

#[test]
fn test_dropped_observer_is_pruned() {
    let subject = Subject::new(Uuid::new_v4());
    let (rec, observer) = recorder();
    subject.attach(&observer);
    assert_eq!(subject.observer_count(), 1);

    drop(observer);
    drop(rec);
    assert_eq!(subject.observer_count(), 0);
    subject.notify();
}

#[test]
fn test_detach_stops_notifications() {
    let subject = Subject::new(Uuid::new_v4());
    let (rec, observer) = recorder();
    subject.attach(&observer);
    subject.detach(&observer);

    subject.notify();
    assert!(rec.updates.lock().is_empty());
}
