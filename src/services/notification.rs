//! # Notification Service
//!
//! In-app notification fan-in for SLA, escalation, approval, and assignment
//! events. Delivery is best-effort: callers never fail because a notification
//! could not be stored, and retention is bounded per user.

use crate::models::Notification;
use dashmap::DashMap;
use tracing::debug;

pub struct NotificationService {
    by_user: DashMap<String, Vec<Notification>>,
    retention: usize,
}

impl NotificationService {
    pub fn new(retention: usize) -> Self {
        Self {
            by_user: DashMap::new(),
            retention,
        }
    }

    /// Record a notification for a user. Oldest entries are dropped once the
    /// per-user retention bound is reached.
    pub fn notify(&self, notification: Notification) {
        debug!(
            user_id = %notification.user_id,
            kind = %notification.kind,
            task_id = ?notification.task_id,
            "notification recorded"
        );
        let mut list = self
            .by_user
            .entry(notification.user_id.clone())
            .or_default();
        list.push(notification);
        if list.len() > self.retention {
            let overflow = list.len() - self.retention;
            list.drain(0..overflow);
        }
    }

    /// List a user's notifications, newest first.
    pub fn list(&self, user_id: &str, unread_only: bool) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .by_user
            .get(user_id)
            .map(|list| {
                list.iter()
                    .filter(|n| !unread_only || !n.read)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        notifications.reverse();
        notifications
    }

    /// Mark one notification read. Returns false when the id is unknown.
    pub fn mark_read(&self, user_id: &str, notification_id: &str) -> bool {
        if let Some(mut list) = self.by_user.get_mut(user_id) {
            if let Some(n) = list.iter_mut().find(|n| n.id == notification_id) {
                n.read = true;
                return true;
            }
        }
        false
    }

    /// Mark all of a user's notifications read, returning how many changed.
    pub fn mark_all_read(&self, user_id: &str) -> usize {
        let mut changed = 0;
        if let Some(mut list) = self.by_user.get_mut(user_id) {
            for n in list.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed += 1;
            }
        }
        changed
    }

    pub fn unread_count(&self, user_id: &str) -> usize {
        self.by_user
            .get(user_id)
            .map(|list| list.iter().filter(|n| !n.read).count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_and_list_newest_first() {
        let service = NotificationService::new(10);
        service.notify(Notification::new("u1", "sla_warning", "First", "m1"));
        service.notify(Notification::new("u1", "escalation", "Second", "m2"));

        let all = service.list("u1", false);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Second");
    }

    #[test]
    fn test_mark_read_and_unread_filter() {
        let service = NotificationService::new(10);
        service.notify(Notification::new("u1", "sla_warning", "First", "m1"));
        let id = service.list("u1", false)[0].id.clone();

        assert!(service.mark_read("u1", &id));
        assert!(service.list("u1", true).is_empty());
        assert_eq!(service.unread_count("u1"), 0);
        assert!(!service.mark_read("u1", "ghost"));
    }

    #[test]
    fn test_retention_bound() {
        let service = NotificationService::new(3);
        for i in 0..5 {
            service.notify(Notification::new("u1", "k", format!("n{i}"), "m"));
        }
        let all = service.list("u1", false);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "n4");
        assert_eq!(all[2].title, "n2");
    }

    #[test]
    fn test_mark_all_read() {
        let service = NotificationService::new(10);
        for i in 0..4 {
            service.notify(Notification::new("u1", "k", format!("n{i}"), "m"));
        }
        assert_eq!(service.mark_all_read("u1"), 4);
        assert_eq!(service.mark_all_read("u1"), 0);
    }
}
