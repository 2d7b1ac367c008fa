//! Process-local repository. Every mutation runs under one write lock, which
//! gives the same uniqueness and cascade guarantees the Postgres schema
//! enforces with constraints.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::*;

#[derive(Default)]
struct State {
    users: HashMap<Id, User>,
    boardings: HashMap<Id, Boarding>,
    boarding_images: Vec<BoardingImage>, // insertion order
    services: HashMap<Id, Service>,
    favorites: HashMap<(Id, Id), DateTime<Utc>>,
    next_id: Id,
}

struct BoardingImage {
    boarding_id: Id,
    image_name: String,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn with_provider_name(&self, mut service: Service) -> Service {
        service.provider_name = self.users.get(&service.provider_id).map(|u| u.name.clone());
        service
    }

    fn images_of(&self, boarding_id: Id) -> Vec<String> {
        self.boarding_images
            .iter()
            .filter(|i| i.boarding_id == boarding_id)
            .map(|i| i.image_name.clone())
            .collect()
    }

    /// Remove boardings plus their images and favorites; returns released files.
    fn cascade_boardings(&mut self, ids: &HashSet<Id>) -> Vec<String> {
        let mut released = Vec::new();
        self.boarding_images.retain(|img| {
            if ids.contains(&img.boarding_id) {
                released.push(img.image_name.clone());
                false
            } else {
                true
            }
        });
        self.favorites.retain(|(_, boarding_id), _| !ids.contains(boarding_id));
        self.boardings.retain(|id, _| !ids.contains(id));
        released
    }
}

#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|e| RepoError::Internal(format!("state lock poisoned: {e}")))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|e| RepoError::Internal(format!("state lock poisoned: {e}")))
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, Id)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut s = self.write()?;
        if s.users.values().any(|u| u.email.eq_ignore_ascii_case(&new.email)) {
            return Err(RepoError::Conflict);
        }
        let id = s.next_id();
        let user = User {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            phone: new.phone,
            created_at: Utc::now(),
        };
        s.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let s = self.read()?;
        Ok(s.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn get_user(&self, id: Id) -> RepoResult<User> {
        let s = self.read()?;
        s.users.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_users(&self, query: &UserQuery) -> RepoResult<Vec<User>> {
        let s = self.read()?;
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut v: Vec<User> = s
            .users
            .values()
            .filter(|u| match &needle {
                Some(n) => u.name.to_lowercase().contains(n) || u.email.to_lowercase().contains(n),
                None => true,
            })
            .filter(|u| query.role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        newest_first(&mut v, |u| (u.created_at, u.id));
        Ok(v)
    }

    async fn delete_user(&self, id: Id) -> RepoResult<Vec<String>> {
        let mut s = self.write()?;
        if s.users.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        let owned: HashSet<Id> = s.boardings.values().filter(|b| b.owner_id == id).map(|b| b.id).collect();
        let mut released = s.cascade_boardings(&owned);
        s.services.retain(|_, svc| {
            if svc.provider_id != id {
                return true;
            }
            released.extend(svc.image.take());
            false
        });
        s.favorites.retain(|(user_id, _), _| *user_id != id);
        Ok(released)
    }
}

#[async_trait]
impl BoardingRepo for InMemRepo {
    async fn create_boarding(&self, owner_id: Id, input: BoardingInput, approved: bool) -> RepoResult<Boarding> {
        let mut s = self.write()?;
        if !s.users.contains_key(&owner_id) {
            return Err(RepoError::NotFound);
        }
        let id = s.next_id();
        let boarding = Boarding {
            id,
            owner_id,
            title: input.title,
            description: input.description,
            kind: input.kind,
            university: input.university,
            town: input.town,
            price: input.price,
            bedrooms: input.bedrooms,
            bathrooms: input.bathrooms,
            facilities: input.facilities,
            contact_phone: input.contact_phone,
            is_approved: approved,
            created_at: Utc::now(),
        };
        s.boardings.insert(id, boarding.clone());
        Ok(boarding)
    }

    async fn get_boarding(&self, id: Id) -> RepoResult<Boarding> {
        let s = self.read()?;
        s.boardings.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn search_boardings(&self, search: &BoardingSearch) -> RepoResult<Vec<Boarding>> {
        let s = self.read()?;
        Ok(search.apply(s.boardings.values().cloned()))
    }

    async fn list_boardings_by_owner(&self, owner_id: Id) -> RepoResult<Vec<Boarding>> {
        let s = self.read()?;
        let mut v: Vec<Boarding> = s.boardings.values().filter(|b| b.owner_id == owner_id).cloned().collect();
        newest_first(&mut v, |b| (b.created_at, b.id));
        Ok(v)
    }

    async fn owner_stats(&self, owner_id: Id) -> RepoResult<OwnerStats> {
        let s = self.read()?;
        Ok(s.boardings.values().filter(|b| b.owner_id == owner_id).fold(OwnerStats::default(), |mut acc, b| {
            acc.total_boardings += 1;
            acc.total_rooms += i64::from(b.bedrooms);
            acc.total_income += b.price;
            acc.total_bathrooms += i64::from(b.bathrooms);
            acc
        }))
    }

    async fn boarding_images(&self, id: Id) -> RepoResult<Vec<String>> {
        let s = self.read()?;
        Ok(s.images_of(id))
    }

    async fn images_for_boardings(&self, ids: &[Id]) -> RepoResult<HashMap<Id, Vec<String>>> {
        let s = self.read()?;
        let wanted: HashSet<Id> = ids.iter().copied().collect();
        let mut out: HashMap<Id, Vec<String>> = HashMap::new();
        for img in s.boarding_images.iter().filter(|i| wanted.contains(&i.boarding_id)) {
            out.entry(img.boarding_id).or_default().push(img.image_name.clone());
        }
        Ok(out)
    }

    async fn add_boarding_image(&self, id: Id, image_name: &str) -> RepoResult<()> {
        let mut s = self.write()?;
        if !s.boardings.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        s.boarding_images.push(BoardingImage { boarding_id: id, image_name: image_name.to_string() });
        Ok(())
    }

    async fn update_boarding(&self, id: Id, input: BoardingInput) -> RepoResult<Boarding> {
        let mut s = self.write()?;
        let b = s.boardings.get_mut(&id).ok_or(RepoError::NotFound)?;
        b.title = input.title;
        b.description = input.description;
        b.kind = input.kind;
        b.university = input.university;
        b.town = input.town;
        b.price = input.price;
        b.bedrooms = input.bedrooms;
        b.bathrooms = input.bathrooms;
        b.facilities = input.facilities;
        b.contact_phone = input.contact_phone;
        Ok(b.clone())
    }

    async fn delete_boarding(&self, id: Id) -> RepoResult<Vec<String>> {
        let mut s = self.write()?;
        if !s.boardings.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        Ok(s.cascade_boardings(&HashSet::from([id])))
    }

    async fn is_boarding_owner(&self, id: Id, user_id: Id) -> RepoResult<bool> {
        let s = self.read()?;
        s.boardings.get(&id).map(|b| b.owner_id == user_id).ok_or(RepoError::NotFound)
    }

    async fn set_boarding_approval(&self, id: Id, approved: bool) -> RepoResult<Boarding> {
        let mut s = self.write()?;
        let b = s.boardings.get_mut(&id).ok_or(RepoError::NotFound)?;
        b.is_approved = approved;
        Ok(b.clone())
    }
}

#[async_trait]
impl ServiceRepo for InMemRepo {
    async fn create_service(&self, provider_id: Id, input: ServiceInput, approved: bool) -> RepoResult<Service> {
        let mut s = self.write()?;
        if !s.users.contains_key(&provider_id) {
            return Err(RepoError::NotFound);
        }
        let id = s.next_id();
        let service = Service {
            id,
            provider_id,
            service_type: input.service_type,
            university: input.university,
            town: input.town,
            name: input.name,
            contact_number: input.contact_number,
            description: input.description,
            image: None,
            is_approved: approved,
            created_at: Utc::now(),
            provider_name: None,
        };
        s.services.insert(id, service.clone());
        Ok(s.with_provider_name(service))
    }

    async fn list_services(&self, approved_only: bool) -> RepoResult<Vec<Service>> {
        let s = self.read()?;
        let mut v: Vec<Service> = s
            .services
            .values()
            .filter(|svc| !approved_only || svc.is_approved)
            .map(|svc| s.with_provider_name(svc.clone()))
            .collect();
        newest_first(&mut v, |svc| (svc.created_at, svc.id));
        Ok(v)
    }

    async fn get_service(&self, id: Id) -> RepoResult<Service> {
        let s = self.read()?;
        let svc = s.services.get(&id).cloned().ok_or(RepoError::NotFound)?;
        Ok(s.with_provider_name(svc))
    }

    async fn list_services_by_provider(&self, provider_id: Id) -> RepoResult<Vec<Service>> {
        let s = self.read()?;
        let mut v: Vec<Service> = s
            .services
            .values()
            .filter(|svc| svc.provider_id == provider_id)
            .map(|svc| s.with_provider_name(svc.clone()))
            .collect();
        newest_first(&mut v, |svc| (svc.created_at, svc.id));
        Ok(v)
    }

    async fn update_service(&self, id: Id, input: ServiceInput) -> RepoResult<Service> {
        let mut s = self.write()?;
        let svc = s.services.get_mut(&id).ok_or(RepoError::NotFound)?;
        svc.service_type = input.service_type;
        svc.university = input.university;
        svc.town = input.town;
        svc.name = input.name;
        svc.contact_number = input.contact_number;
        svc.description = input.description;
        let updated = svc.clone();
        Ok(s.with_provider_name(updated))
    }

    async fn delete_service(&self, id: Id) -> RepoResult<Option<String>> {
        let mut s = self.write()?;
        let svc = s.services.remove(&id).ok_or(RepoError::NotFound)?;
        Ok(svc.image)
    }

    async fn is_service_provider(&self, id: Id, user_id: Id) -> RepoResult<bool> {
        let s = self.read()?;
        s.services.get(&id).map(|svc| svc.provider_id == user_id).ok_or(RepoError::NotFound)
    }

    async fn set_service_image(&self, id: Id, image_name: &str) -> RepoResult<Option<String>> {
        let mut s = self.write()?;
        let svc = s.services.get_mut(&id).ok_or(RepoError::NotFound)?;
        Ok(svc.image.replace(image_name.to_string()))
    }

    async fn set_service_approval(&self, id: Id, approved: bool) -> RepoResult<Service> {
        let mut s = self.write()?;
        let svc = s.services.get_mut(&id).ok_or(RepoError::NotFound)?;
        svc.is_approved = approved;
        let updated = svc.clone();
        Ok(s.with_provider_name(updated))
    }
}

#[async_trait]
impl FavoriteRepo for InMemRepo {
    async fn add_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool> {
        let mut s = self.write()?;
        if !s.users.contains_key(&user_id) || !s.boardings.contains_key(&boarding_id) {
            return Err(RepoError::NotFound);
        }
        if s.favorites.contains_key(&(user_id, boarding_id)) {
            return Ok(false);
        }
        s.favorites.insert((user_id, boarding_id), Utc::now());
        Ok(true)
    }

    async fn remove_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool> {
        let mut s = self.write()?;
        Ok(s.favorites.remove(&(user_id, boarding_id)).is_some())
    }

    async fn list_favorites(&self, user_id: Id) -> RepoResult<Vec<FavoriteBoarding>> {
        let s = self.read()?;
        let mut v: Vec<FavoriteBoarding> = s
            .favorites
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .filter_map(|((_, bid), at)| {
                s.boardings.get(bid).map(|b| FavoriteBoarding {
                    boarding: b.clone(),
                    favorited_at: *at,
                    images: Vec::new(),
                })
            })
            .collect();
        newest_first(&mut v, |f| (f.favorited_at, f.boarding.id));
        Ok(v)
    }

    async fn is_favorite(&self, user_id: Id, boarding_id: Id) -> RepoResult<bool> {
        let s = self.read()?;
        Ok(s.favorites.contains_key(&(user_id, boarding_id)))
    }
}
